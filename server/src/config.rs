//! Configuration management for the server.

use std::env;
use std::time::Duration;

/// Default time a watch request is held open before answering 204.
const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 25;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Shared secret bearer tokens must carry; development mode when unset
    pub auth_secret: Option<String>,
    /// How long a watch request waits for a new revision
    pub watch_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?;

        let auth_secret = lookup("AUTH_SECRET").filter(|secret| !secret.is_empty());

        let watch_timeout = match lookup("WATCH_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidWatchTimeout)?,
            None => Duration::from_secs(DEFAULT_WATCH_TIMEOUT_SECS),
        };

        Ok(Self {
            host,
            port,
            database_url,
            auth_secret,
            watch_timeout,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid WATCH_TIMEOUT_SECS value")]
    InvalidWatchTimeout,
}
