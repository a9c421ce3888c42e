use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::service::Principal;
use crate::config::AccountSeed;
use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Public view of an account; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl Account {
    pub fn principal(&self) -> Principal {
        Principal {
            subject_id: self.id.to_string(),
            email: self.email.clone(),
        }
    }
}

/// Credential checks the session layer delegates to. Swap the in-memory
/// [`AccountStore`] for a real directory by implementing this trait.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(None)` means unknown account or wrong password; the two are
    /// deliberately indistinguishable.
    fn verify(&self, email: &str, password: &str) -> Result<Option<Account>, AppError>;

    fn find(&self, email: &str) -> Option<Account>;

    /// Hashes a password for a later [`set_password_hash`](Self::set_password_hash).
    fn hash_password(&self, password: &str) -> Result<String, AppError>;

    /// Swaps in an already computed hash. Returns `false` when no account
    /// exists for `email`.
    fn set_password_hash(&self, email: &str, password_hash: &str) -> bool;
}

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password_hash: String,
}

/// In-process account table with bcrypt password hashes.
pub struct AccountStore {
    accounts: Mutex<HashMap<String, StoredAccount>>,
    hash_cost: u32,
    // Checked against on unknown emails so both paths pay the bcrypt cost.
    dummy_hash: String,
}

impl AccountStore {
    pub fn new(hash_cost: u32) -> Result<Self, AppError> {
        let dummy_hash = bcrypt::hash(Uuid::new_v4().to_string(), hash_cost)?;
        Ok(Self {
            accounts: Mutex::new(HashMap::new()),
            hash_cost,
            dummy_hash,
        })
    }

    pub fn from_seeds(seeds: &[AccountSeed], hash_cost: u32) -> Result<Self, AppError> {
        let store = Self::new(hash_cost)?;
        for seed in seeds {
            store.register(&seed.email, &seed.password, seed.name.as_deref())?;
        }
        Ok(store)
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<String, StoredAccount>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Account, AppError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::validation(format!("Invalid email address: {}", email)));
        }
        let password_hash = bcrypt::hash(password, self.hash_cost)?;
        let account = Account {
            id: Uuid::new_v4(),
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| display_name_from_email(&email)),
            email: email.clone(),
        };

        self.accounts().insert(
            email.clone(),
            StoredAccount {
                account: account.clone(),
                password_hash,
            },
        );
        info!("Registered account {}", email);

        Ok(account)
    }
}

impl CredentialVerifier for AccountStore {
    fn verify(&self, email: &str, password: &str) -> Result<Option<Account>, AppError> {
        let stored = self.accounts().get(email).cloned();

        match stored {
            Some(stored) if bcrypt::verify(password, &stored.password_hash)? => {
                Ok(Some(stored.account))
            }
            Some(_) => Ok(None),
            None => {
                bcrypt::verify(password, &self.dummy_hash)?;
                Ok(None)
            }
        }
    }

    fn find(&self, email: &str) -> Option<Account> {
        self.accounts().get(email).map(|stored| stored.account.clone())
    }

    fn hash_password(&self, password: &str) -> Result<String, AppError> {
        Ok(bcrypt::hash(password, self.hash_cost)?)
    }

    fn set_password_hash(&self, email: &str, password_hash: &str) -> bool {
        match self.accounts().get_mut(email) {
            Some(stored) => {
                stored.password_hash = password_hash.to_string();
                true
            }
            None => false,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A single `@` with a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn display_name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}
