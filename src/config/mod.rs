use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::AppError;

const DEFAULT_JWT_SECRET: &str = "development_secret";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub max_login_attempts: u32,
    pub lockout_minutes: i64,
    pub attempt_window_minutes: i64,
    pub reset_token_ttl_minutes: i64,
    pub password_hash_cost: u32,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub max_age: u32,
}

/// An account loaded into the in-memory credential store at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct AccountSeed {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::with_defaults(Config::builder(), "development")?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_AUTH__LOCKOUT_MINUTES=30` would set `Settings.auth.lockout_minutes`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Settings with no file or environment sources, suitable for tests.
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Self::with_defaults(Config::builder(), "test")?
            .set_override("auth.jwt_secret", "test_secret")?
            .set_override("auth.password_hash_cost", 4)?
            .set_override("auth.sweep_interval_secs", 0)?
            .build()?
            .try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("auth.jwt_secret", DEFAULT_JWT_SECRET)?
            .set_default("auth.access_token_ttl_secs", 3600)?
            .set_default("auth.refresh_token_ttl_secs", 604_800)?
            .set_default("auth.max_login_attempts", 5)?
            .set_default("auth.lockout_minutes", 15)?
            .set_default("auth.attempt_window_minutes", 15)?
            .set_default("auth.reset_token_ttl_minutes", 60)?
            .set_default("auth.password_hash_cost", bcrypt::DEFAULT_COST as i64)?
            .set_default("auth.sweep_interval_secs", 300)?
            .set_default("cors.enabled", true)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("cors.max_age", 3600)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Rejects settings that would produce an unusable or unsafe service.
    pub fn validate(&self) -> Result<(), AppError> {
        let auth = &self.auth;
        if auth.jwt_secret.is_empty() {
            return Err(AppError::ConfigError("auth.jwt_secret must not be empty".into()));
        }
        if self.is_production() && auth.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(AppError::ConfigError(
                "auth.jwt_secret must be overridden in production".into(),
            ));
        }
        if auth.access_token_ttl_secs <= 0 || auth.refresh_token_ttl_secs <= 0 {
            return Err(AppError::ConfigError("token TTLs must be positive".into()));
        }
        if auth.max_login_attempts == 0 {
            return Err(AppError::ConfigError(
                "auth.max_login_attempts must be at least 1".into(),
            ));
        }
        if auth.lockout_minutes <= 0
            || auth.attempt_window_minutes <= 0
            || auth.reset_token_ttl_minutes <= 0
        {
            return Err(AppError::ConfigError(
                "lockout, attempt window and reset TTL must be positive".into(),
            ));
        }
        Ok(())
    }
}
