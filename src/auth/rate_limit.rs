use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use chrono::{DateTime, Utc, Duration};
use tracing::warn;

use crate::clock::Clock;
use crate::config::AuthConfig;

#[derive(Debug, Clone)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub lockout_duration: Duration,
    /// A failing record with no new failure for this long is forgotten.
    pub attempt_window: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::minutes(15),
            attempt_window: Duration::minutes(15),
        }
    }
}

impl LockoutConfig {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            max_attempts: config.max_login_attempts,
            lockout_duration: Duration::minutes(config.lockout_minutes),
            attempt_window: Duration::minutes(config.attempt_window_minutes),
        }
    }
}

/// What a login attempt for an identifier is currently allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Allowed { remaining_attempts: u32 },
    Locked { remaining_minutes: i64 },
}

impl AttemptStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, AttemptStatus::Locked { .. })
    }
}

#[derive(Debug)]
struct AttemptRecord {
    attempts: u32,
    locked_until: Option<DateTime<Utc>>,
    last_failure: DateTime<Utc>,
}

impl AttemptRecord {
    fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map_or(false, |until| now < until)
    }

    /// Lapsed locks and idle failure streaks read as a clean record.
    fn is_expired(&self, now: DateTime<Utc>, config: &LockoutConfig) -> bool {
        match self.locked_until {
            Some(until) => now >= until,
            None => now - self.last_failure >= config.attempt_window,
        }
    }
}

/// Per-identifier failed-login counter with a lockout window.
///
/// State lives in a single mutex-guarded table; every operation completes
/// under one lock acquisition. Records are never deleted on read, expired
/// ones are simply reported as clean until [`purge_expired`](Self::purge_expired)
/// reclaims them.
pub struct LoginAttemptTracker {
    records: Mutex<HashMap<String, AttemptRecord>>,
    config: LockoutConfig,
    clock: Arc<dyn Clock>,
}

impl LoginAttemptTracker {
    pub fn new(config: LockoutConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, AttemptRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status_of(&self, record: Option<&AttemptRecord>, now: DateTime<Utc>) -> AttemptStatus {
        match record {
            Some(record) if record.is_locked(now) => {
                let remaining = record.locked_until.unwrap_or(now) - now;
                AttemptStatus::Locked {
                    remaining_minutes: ceil_minutes(remaining),
                }
            }
            Some(record) if !record.is_expired(now, &self.config) => AttemptStatus::Allowed {
                remaining_attempts: self.config.max_attempts.saturating_sub(record.attempts),
            },
            _ => AttemptStatus::Allowed {
                remaining_attempts: self.config.max_attempts,
            },
        }
    }

    /// Pure read of the identifier's state.
    pub fn check(&self, id: &str) -> AttemptStatus {
        let now = self.clock.now();
        let records = self.records();
        self.status_of(records.get(id), now)
    }

    /// Counts a failed login and returns the resulting state. Reaching
    /// `max_attempts` stamps the lockout.
    pub fn record_failure(&self, id: &str) -> AttemptStatus {
        let now = self.clock.now();
        let mut records = self.records();
        let record = records.entry(id.to_string()).or_insert(AttemptRecord {
            attempts: 0,
            locked_until: None,
            last_failure: now,
        });

        if record.is_locked(now) {
            // Another request raced past `check`; the lock already stands.
            return self.status_of(Some(&*record), now);
        }
        if record.is_expired(now, &self.config) {
            record.attempts = 0;
            record.locked_until = None;
        }

        record.attempts += 1;
        record.last_failure = now;
        if record.attempts >= self.config.max_attempts {
            record.locked_until = Some(now + self.config.lockout_duration);
            warn!(
                "Locking {} after {} failed login attempts",
                id, record.attempts
            );
        }

        self.status_of(Some(&*record), now)
    }

    /// Returns the identifier to a clean state. An active lockout is left to
    /// run out on its own.
    pub fn record_success(&self, id: &str) {
        let now = self.clock.now();
        let mut records = self.records();
        if let Some(record) = records.get(id) {
            if record.is_locked(now) {
                return;
            }
            records.remove(id);
        }
    }

    /// Drops records every read already treats as expired.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now, &self.config));
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ceil_minutes(remaining: Duration) -> i64 {
    let millis = remaining.num_milliseconds().max(0);
    (millis + 59_999) / 60_000
}
