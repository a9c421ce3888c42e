pub mod auth;
pub mod clock;
pub mod config;
pub mod error;

use std::sync::Arc;
use actix_web::HttpResponse;
use chrono::Duration;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use auth::{
    AccountStore, CookiePolicy, CredentialVerifier, LockoutConfig, LoginAttemptTracker,
    PasswordResetStore, Principal, TokenService,
};
use clock::{Clock, SystemClock};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub tokens: Arc<TokenService>,
    pub attempts: Arc<LoginAttemptTracker>,
    pub resets: Arc<PasswordResetStore>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub cookies: CookiePolicy,
}

impl AppState {
    /// Builds the state from settings, seeding the in-memory account store
    /// from `config.accounts`.
    pub fn new(config: Settings) -> Result<Self> {
        config.validate()?;
        let accounts = AccountStore::from_seeds(&config.accounts, config.auth.password_hash_cost)?;
        Ok(Self::with_parts(config, Arc::new(accounts), Arc::new(SystemClock)))
    }

    /// Builds the state around a caller-supplied credential verifier and clock.
    pub fn with_parts(
        config: Settings,
        credentials: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth = &config.auth;
        let tokens = TokenService::from_config(auth, clock.clone());
        // Cookies live exactly as long as the tokens they carry.
        let cookies = CookiePolicy {
            secure: config.is_production(),
            access_max_age: tokens.access_ttl().num_seconds(),
            refresh_max_age: tokens.refresh_ttl().num_seconds(),
        };

        Self {
            tokens: Arc::new(tokens),
            attempts: Arc::new(LoginAttemptTracker::new(
                LockoutConfig::from_config(auth),
                clock.clone(),
            )),
            resets: Arc::new(PasswordResetStore::new(
                Duration::minutes(auth.reset_token_ttl_minutes),
                clock,
            )),
            credentials,
            cookies,
            config: Arc::new(config),
        }
    }

    /// Evicts expired lockout and reset records. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.attempts.purge_expired() + self.resets.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountSeed;

    #[test]
    fn test_app_state_creation_seeds_accounts() {
        let mut config = Settings::new_for_test().expect("Failed to load test config");
        config.accounts.push(AccountSeed {
            email: "Demo@Example.com".into(),
            password: "password123".into(),
            name: Some("Demo".into()),
        });

        let state = AppState::new(config).expect("Failed to build state");
        let account = state
            .credentials
            .verify("demo@example.com", "password123")
            .unwrap()
            .expect("seeded account should verify");
        assert_eq!(account.name, "Demo");
        assert_eq!(state.cookies.access_max_age, 3600);
        assert_eq!(
            state.cookies.refresh_max_age,
            state.tokens.refresh_ttl().num_seconds()
        );
        assert!(!state.cookies.secure);
    }

    #[test]
    fn test_app_state_rejects_invalid_config() {
        let mut config = Settings::new_for_test().unwrap();
        config.auth.jwt_secret.clear();
        assert!(matches!(AppState::new(config), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_app_state_clone() {
        let state = AppState::new(Settings::new_for_test().unwrap()).unwrap();
        let cloned = state.clone();

        // Verify Arc references are shared
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.attempts, &cloned.attempts));
        assert!(Arc::ptr_eq(&state.resets, &cloned.resets));
    }
}
