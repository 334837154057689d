use crate::streaming::{StreamConfig, StreamError};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process-level settings for a long-running ingest, loaded from environment
/// variables (and a `.env` file when present)
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// JSON file holding the stream definitions
    pub streams_file: Option<PathBuf>,
    /// Seconds between consumer drains
    pub drain_interval_secs: u64,
    /// Maximum records drained per stream per tick
    pub drain_batch: usize,
    /// Seconds to wait for each worker on shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            streams_file: None,
            drain_interval_secs: 5,
            drain_batch: 100,
            shutdown_timeout_secs: 10,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            streams_file: lookup("INGEST_STREAMS_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            drain_interval_secs: parse_var(
                &lookup,
                "INGEST_DRAIN_INTERVAL_SECS",
                defaults.drain_interval_secs,
            )?,
            drain_batch: parse_var(&lookup, "INGEST_DRAIN_BATCH", defaults.drain_batch)?,
            shutdown_timeout_secs: parse_var(
                &lookup,
                "INGEST_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout_secs,
            )?,
        };

        if config.drain_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "INGEST_DRAIN_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        if config.drain_batch == 0 {
            return Err(ConfigError::InvalidValue(
                "INGEST_DRAIN_BATCH must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a valid number: '{}'", key, raw))),
        None => Ok(default),
    }
}

/// Read stream definitions (a JSON array of stream configs) without
/// validating them
pub fn read_stream_configs(path: &Path) -> Result<Vec<StreamConfig>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read stream definitions and reject the file unless every entry is valid
/// and names are unique
pub fn load_stream_configs(path: &Path) -> Result<Vec<StreamConfig>, ConfigError> {
    let configs = read_stream_configs(path)?;

    let mut seen = HashSet::new();
    for config in &configs {
        config.validate()?;
        if !seen.insert(config.name.as_str()) {
            return Err(StreamError::DuplicateStream(config.name.clone()).into());
        }
    }

    log::debug!("Loaded {} stream(s) from {}", configs.len(), path.display());
    Ok(configs)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse stream definitions in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid stream definition: {0}")]
    Stream(#[from] StreamError),
}
