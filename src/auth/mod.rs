//! Session authentication: token issuance, login lockout, password reset
//! tokens and the HTTP handlers that tie them to cookies.

pub mod cookies;
pub mod credentials;
pub mod handlers;
pub mod rate_limit;
pub mod reset;
pub mod service;

pub use cookies::CookiePolicy;
pub use credentials::{Account, AccountStore, CredentialVerifier};
pub use rate_limit::{AttemptStatus, LockoutConfig, LoginAttemptTracker};
pub use reset::{ConsumeOutcome, PasswordResetStore};
pub use service::{Principal, TokenClaims, TokenKind, TokenRejection, TokenService};
