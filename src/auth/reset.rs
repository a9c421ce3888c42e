//! Single-use password reset tokens.
//!
//! Tokens are opaque random lookup keys, not signed claims. Only the SHA-256
//! digest of a token is kept as the table key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::clock::Clock;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct ResetTokenRecord {
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl ResetTokenRecord {
    fn accepts(&self, email: &str, now: DateTime<Utc>) -> bool {
        !self.consumed && self.email == email && now < self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Updated,
    Rejected,
}

pub struct PasswordResetStore {
    records: Mutex<HashMap<String, ResetTokenRecord>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PasswordResetStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, ResetTokenRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(token: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
    }

    /// Issues a fresh token for `email`, valid for the store's TTL.
    pub fn create(&self, email: &str) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let now = self.clock.now();
        let record = ResetTokenRecord {
            email: email.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
            consumed: false,
        };
        self.records().insert(Self::key(&token), record);
        debug!("Created password reset token for {}", email);

        token
    }

    /// True iff the token exists for `email`, is unconsumed and unexpired.
    pub fn validate(&self, token: &str, email: &str) -> bool {
        let now = self.clock.now();
        self.records()
            .get(&Self::key(token))
            .map_or(false, |record| record.accepts(email, now))
    }

    /// Validates the token and, if it is acceptable, runs `apply` with the
    /// email while the store is locked. The record is marked consumed only
    /// when `apply` succeeds; an error from `apply` leaves it untouched.
    pub fn consume<F, E>(&self, token: &str, email: &str, apply: F) -> Result<ConsumeOutcome, E>
    where
        F: FnOnce(&str) -> Result<(), E>,
    {
        let now = self.clock.now();
        let mut records = self.records();
        let record = match records.get_mut(&Self::key(token)) {
            Some(record) if record.accepts(email, now) => record,
            _ => return Ok(ConsumeOutcome::Rejected),
        };

        apply(&record.email)?;
        record.consumed = true;
        info!("Password reset token consumed for {}", record.email);

        Ok(ConsumeOutcome::Updated)
    }

    /// Drops consumed and expired records.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records();
        let before = records.len();
        records.retain(|_, record| !record.consumed && now < record.expires_at);
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
