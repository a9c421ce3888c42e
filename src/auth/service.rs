use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AppError;
use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{encode, decode, Header, EncodingKey, DecodingKey, Validation, Algorithm};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// The identity carried inside a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,   // Subject ID
    pub email: String,
    pub kind: TokenKind,
    pub iat: i64,      // Issued at
    pub exp: i64,      // Expiration time
}

impl TokenClaims {
    pub fn principal(&self) -> Principal {
        Principal {
            subject_id: self.sub.clone(),
            email: self.email.clone(),
        }
    }
}

/// Why a token string was not accepted. Expired sessions are routine, so
/// verification reports these as values rather than as `AppError`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token kind mismatch")]
    WrongKind,
}

/// Issues and verifies HS256-signed access and refresh tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(
        secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Expiry is checked against the injected clock with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
            clock,
        }
    }

    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::seconds(config.access_token_ttl_secs),
            Duration::seconds(config.refresh_token_ttl_secs),
            clock,
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access_token(&self, principal: &Principal) -> Result<String, AppError> {
        self.issue(principal, TokenKind::Access)
    }

    pub fn issue_refresh_token(&self, principal: &Principal) -> Result<String, AppError> {
        self.issue(principal, TokenKind::Refresh)
    }

    fn issue(&self, principal: &Principal, kind: TokenKind) -> Result<String, AppError> {
        let now = self.clock.now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = TokenClaims {
            sub: principal.subject_id.clone(),
            email: principal.email.clone(),
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(token)
    }

    /// Checks signature, structure and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenRejection> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            })?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(TokenRejection::Expired);
        }

        Ok(data.claims)
    }

    /// Like [`verify`](Self::verify), but also requires the token to be of `kind`.
    pub fn verify_as(&self, token: &str, kind: TokenKind) -> Result<Principal, TokenRejection> {
        let claims = self.verify(token)?;
        if claims.kind != kind {
            return Err(TokenRejection::WrongKind);
        }
        Ok(claims.principal())
    }
}
