//! Client configuration.
//!
//! Values come from the environment with fallbacks suitable for a local CMS:
//! - `CMS_TODO_API_URL`: API root, default `http://localhost:1337/api`
//! - `CMS_TODO_TIMEOUT_SECS`: request timeout the host should apply, default 10

use std::time::Duration;

use thiserror::Error;

pub const API_URL_VAR: &str = "CMS_TODO_API_URL";
pub const TIMEOUT_VAR: &str = "CMS_TODO_TIMEOUT_SECS";

pub const DEFAULT_API_URL: &str = "http://localhost:1337/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid CMS_TODO_TIMEOUT_SECS value {value:?}: expected whole seconds")]
    InvalidTimeout { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(API_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(TIMEOUT_VAR).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout { value: raw.clone() })?;
            config.timeout = Duration::from_secs(secs);
        }
        tracing::debug!(base_url = %config.base_url, timeout = ?config.timeout, "client config loaded");
        Ok(config)
    }
}
