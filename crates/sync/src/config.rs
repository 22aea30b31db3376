//! Runtime configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

const ENV_API_URL: &str = "WORKERDESK_API_URL";
const ENV_PROBE_TIMEOUT: &str = "WORKERDESK_PROBE_TIMEOUT_SECS";
const ENV_POLL_INTERVAL: &str = "WORKERDESK_POLL_INTERVAL_SECS";
const ENV_STORE_PATH: &str = "WORKERDESK_STORE_PATH";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },
    #[error("failed to resolve OS app data directory; set {0}")]
    NoDataDir(&'static str),
}

/// Settings for the worker sync layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL shared by every worker API request, without trailing `/`.
    pub api_url: String,
    /// Timeout for the connectivity probe only; other calls use client defaults.
    pub probe_timeout: Duration,
    /// Period of the background connectivity monitor.
    pub poll_interval: Duration,
    /// SQLite file backing the durable key-value store.
    pub store_path: PathBuf,
}

impl SyncConfig {
    pub fn new(api_url: impl Into<String>, store_path: PathBuf) -> Self {
        Self {
            api_url: trim_base_url(&api_url.into()),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            store_path,
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup(ENV_API_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let store_path = match lookup(ENV_STORE_PATH).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_store_path()?,
        };

        let mut config = Self::new(api_url, store_path);
        config.probe_timeout =
            seconds(&lookup, ENV_PROBE_TIMEOUT)?.unwrap_or(config.probe_timeout);
        config.poll_interval =
            seconds(&lookup, ENV_POLL_INTERVAL)?.unwrap_or(config.poll_interval);
        Ok(config)
    }
}

fn seconds<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::InvalidSeconds { var, value }),
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// `{app_data_dir}/workerdesk/store.db`.
fn default_store_path() -> Result<PathBuf, ConfigError> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .ok_or(ConfigError::NoDataDir(ENV_STORE_PATH))?;

    dir.push("workerdesk");
    dir.push("store.db");
    Ok(dir)
}
