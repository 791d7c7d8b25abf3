//! Application configuration
//!
//! Read once from the environment by the binaries and handed to components as
//! typed sub-configs. Nothing below the binaries reads the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use newslog_core::DEFAULT_FAILING_THRESHOLD;
use newslog_feeds::FetchConfig;

use crate::ingestion::IngestionConfig;

/// Top-level configuration for every Newslog binary
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// HTTP API port
    pub server_port: u16,
    pub fetch: FetchConfig,
    pub ingestion: IngestionConfig,
    /// Failure count at which a feed shows up as failing
    pub failing_feed_threshold: u32,
    /// JSON file with the seed feed list
    pub seed_feeds_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/newslog.db"),
            server_port: 3001,
            fetch: FetchConfig::default(),
            ingestion: IngestionConfig::default(),
            failing_feed_threshold: DEFAULT_FAILING_THRESHOLD,
            seed_feeds_path: PathBuf::from("config/feeds.seed.json"),
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(path) = get("SEED_FEEDS_PATH") {
            config.seed_feeds_path = PathBuf::from(path);
        }
        if let Some(agent) = get("FETCH_USER_AGENT") {
            config.fetch.user_agent = agent;
        }

        if let Some(port) = parse_var(&get, "SERVER_PORT")? {
            config.server_port = port;
        }
        if let Some(timeout) = parse_var::<u64, _>(&get, "FETCH_TIMEOUT_SECS")? {
            if timeout == 0 {
                return Err(ConfigError::OutOfRange {
                    key: "FETCH_TIMEOUT_SECS",
                    reason: "must be at least 1",
                });
            }
            config.fetch.timeout_secs = timeout;
        }
        if let Some(workers) = parse_var::<usize, _>(&get, "MAX_CONCURRENT_FETCHES")? {
            if workers == 0 {
                return Err(ConfigError::OutOfRange {
                    key: "MAX_CONCURRENT_FETCHES",
                    reason: "must be at least 1",
                });
            }
            config.ingestion.max_concurrent_fetches = workers;
        }
        if let Some(threshold) = parse_var(&get, "FAILING_FEED_THRESHOLD")? {
            config.failing_feed_threshold = threshold;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(get: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue {
                    key,
                    value: value.clone(),
                    error: e.to_string(),
                })
        })
        .transpose()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key} ({value:?}): {error}")]
    InvalidValue {
        key: &'static str,
        value: String,
        error: String,
    },

    #[error("{key} {reason}")]
    OutOfRange {
        key: &'static str,
        reason: &'static str,
    },

    #[error("Failed to read {path}: {error}")]
    Unreadable { path: String, error: String },

    #[error("Invalid JSON in {path}: {error}")]
    InvalidJson { path: String, error: String },
}
