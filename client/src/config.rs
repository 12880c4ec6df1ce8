//! Configuration for the sync runtime.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tote_engine::LoginPolicy;

/// Default debounce window for remote writes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Quiet period after the last mutation before a remote write
    pub debounce: Duration,
    /// What happens to an anonymous list on sign-in
    pub login_policy: LoginPolicy,
    /// Directory for the file cache; memory cache when absent
    pub cache_dir: Option<PathBuf>,
    /// Base URL of the document service
    pub remote_url: Option<String>,
    /// Pause between failed watch requests
    pub watch_retry: Duration,
    /// Shared secret appended to the signed-in user's bearer token
    pub auth_secret: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            login_policy: LoginPolicy::default(),
            cache_dir: None,
            remote_url: None,
            watch_retry: crate::http::DEFAULT_WATCH_RETRY,
            auth_secret: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let debounce = match lookup("TOTE_DEBOUNCE_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidDebounce(raw))?,
            ),
            None => defaults.debounce,
        };

        let login_policy = match lookup("TOTE_LOGIN_POLICY") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidLoginPolicy(raw))?,
            None => defaults.login_policy,
        };

        let cache_dir = lookup("TOTE_CACHE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let remote_url = lookup("TOTE_REMOTE_URL").filter(|url| !url.trim().is_empty());

        let watch_retry = match lookup("TOTE_WATCH_RETRY_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidWatchRetry(raw))?,
            ),
            None => defaults.watch_retry,
        };

        let auth_secret = lookup("TOTE_AUTH_SECRET").filter(|secret| !secret.is_empty());

        Ok(Self {
            debounce,
            login_policy,
            cache_dir,
            remote_url,
            watch_retry,
            auth_secret,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOTE_DEBOUNCE_MS value: {0}")]
    InvalidDebounce(String),

    #[error("Invalid TOTE_LOGIN_POLICY value: {0} (expected discard or merge)")]
    InvalidLoginPolicy(String),

    #[error("Invalid TOTE_WATCH_RETRY_MS value: {0}")]
    InvalidWatchRetry(String),
}
