use chrono::Duration;
use session_auth::auth::{
    AttemptStatus, ConsumeOutcome, LockoutConfig, LoginAttemptTracker, PasswordResetStore,
    Principal, TokenKind, TokenRejection, TokenService,
};
use session_auth::clock::ManualClock;
use std::sync::Arc;

fn principal() -> Principal {
    Principal {
        subject_id: "c0ffee00-0000-4000-8000-000000000001".to_string(),
        email: "test@example.com".to_string(),
    }
}

#[test]
fn test_token_round_trip_and_expiry() {
    let clock = Arc::new(ManualClock::default());
    let tokens = TokenService::new("test_secret", Duration::hours(1), Duration::days(7), clock.clone());

    let access = tokens.issue_access_token(&principal()).unwrap();
    let refresh = tokens.issue_refresh_token(&principal()).unwrap();
    assert_eq!(tokens.verify_as(&access, TokenKind::Access).unwrap(), principal());
    assert_eq!(tokens.verify_as(&refresh, TokenKind::Refresh).unwrap(), principal());

    clock.advance(Duration::hours(1));
    assert_eq!(tokens.verify(&access), Err(TokenRejection::Expired));
    assert!(tokens.verify(&refresh).is_ok());
}

#[test]
fn test_distinct_secrets_do_not_share_tokens() {
    let clock = Arc::new(ManualClock::default());
    let a = TokenService::new("secret-a", Duration::hours(1), Duration::days(7), clock.clone());
    let b = TokenService::new("secret-b", Duration::hours(1), Duration::days(7), clock);

    let token = a.issue_access_token(&principal()).unwrap();
    assert!(b.verify(&token).is_err());
}

#[test]
fn test_lockout_lifecycle() {
    let clock = Arc::new(ManualClock::default());
    let tracker = LoginAttemptTracker::new(LockoutConfig::default(), clock.clone());
    let id = "test@example.com";

    for _ in 0..4 {
        tracker.record_failure(id);
    }
    assert_eq!(tracker.check(id), AttemptStatus::Allowed { remaining_attempts: 1 });

    tracker.record_failure(id);
    assert_eq!(tracker.check(id), AttemptStatus::Locked { remaining_minutes: 15 });

    clock.advance(Duration::minutes(15));
    assert_eq!(tracker.check(id), AttemptStatus::Allowed { remaining_attempts: 5 });
}

#[test]
fn test_reset_token_single_use() {
    let clock = Arc::new(ManualClock::default());
    let store = PasswordResetStore::new(Duration::minutes(60), clock);
    let token = store.create("test@example.com");

    let update = |_: &str| -> Result<(), std::convert::Infallible> { Ok(()) };
    assert_eq!(
        store.consume(&token, "test@example.com", update),
        Ok(ConsumeOutcome::Updated)
    );
    assert_eq!(
        store.consume(&token, "test@example.com", update),
        Ok(ConsumeOutcome::Rejected)
    );
}
