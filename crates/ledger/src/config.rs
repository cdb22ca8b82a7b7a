//! Ledger configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LOYALTEA_TOKEN_SECRET` - Transaction token signing secret (min 32 chars)
//! - `LOYALTEA_TERMINAL_SECRET` - Terminal credential signing secret (min 32
//!   chars, must differ from the token secret)
//!
//! ## Optional
//! - `LOYALTEA_DATABASE_URL` - `PostgreSQL` connection string for the ledger store
//! - `LOYALTEA_TOKEN_TTL_SECS` - Token validity window (default: 120)
//! - `LOYALTEA_TERMINAL_TTL_SECS` - Terminal credential window (default: 300)

use chrono::TimeDelta;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Default transaction token validity window: long enough for optical
/// scanning, short enough to bound replay risk.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 120;

/// Default terminal credential window: one scanning session, not one scan.
pub const DEFAULT_TERMINAL_TTL_SECS: i64 = 300;

/// How long a consumed token id is remembered past its expiry. Must be at
/// least the maximum token validity window.
pub const REPLAY_RETENTION_SECS: i64 = 900;

const MIN_SECRET_LENGTH: usize = 32;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Ledger core configuration.
#[derive(Clone)]
pub struct LedgerConfig {
    /// Transaction token signing secret.
    pub token_secret: SecretString,
    /// Terminal credential signing secret.
    pub terminal_secret: SecretString,
    /// `PostgreSQL` connection URL for the ledger store (contains password).
    pub database_url: Option<SecretString>,
    /// Transaction token validity window.
    pub token_ttl: TimeDelta,
    /// Terminal credential validity window.
    pub terminal_ttl: TimeDelta,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("token_secret", &"[REDACTED]")
            .field("terminal_secret", &"[REDACTED]")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl", &self.token_ttl)
            .field("terminal_ttl", &self.terminal_ttl)
            .finish()
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing, a value
    /// doesn't parse, or a signing secret fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token_secret = require_secret("LOYALTEA_TOKEN_SECRET")?;
        let terminal_secret = require_secret("LOYALTEA_TERMINAL_SECRET")?;
        if token_secret.expose_secret() == terminal_secret.expose_secret() {
            return Err(ConfigError::InsecureSecret(
                "LOYALTEA_TERMINAL_SECRET".to_owned(),
                "must differ from LOYALTEA_TOKEN_SECRET".to_owned(),
            ));
        }

        let database_url = std::env::var("LOYALTEA_DATABASE_URL")
            .ok()
            .map(SecretString::from);

        Ok(Self {
            token_secret,
            terminal_secret,
            database_url,
            token_ttl: ttl_from_env("LOYALTEA_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            terminal_ttl: ttl_from_env("LOYALTEA_TERMINAL_TTL_SECS", DEFAULT_TERMINAL_TTL_SECS)?,
        })
    }
}

fn require_secret(name: &str) -> Result<SecretString, ConfigError> {
    let value =
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_owned()))?;
    validate_secret(name, &value)?;
    Ok(SecretString::from(value))
}

fn validate_secret(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            name.to_owned(),
            format!("must be at least {MIN_SECRET_LENGTH} characters"),
        ));
    }
    let lowered = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS
        .iter()
        .copied()
        .find(|p| lowered.contains(*p))
    {
        return Err(ConfigError::InsecureSecret(
            name.to_owned(),
            format!("looks like a placeholder (contains {pattern:?})"),
        ));
    }
    Ok(())
}

fn ttl_from_env(name: &str, default_secs: i64) -> Result<TimeDelta, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(TimeDelta::seconds(default_secs)),
        Ok(raw) => {
            let secs: i64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar(name.to_owned(), raw.clone()))?;
            if secs <= 0 {
                return Err(ConfigError::InvalidEnvVar(
                    name.to_owned(),
                    "must be positive".to_owned(),
                ));
            }
            Ok(TimeDelta::seconds(secs))
        }
    }
}
