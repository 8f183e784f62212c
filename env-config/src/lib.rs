//! Runtime configuration for the mirror.
//!
//! Loaded from a YAML file, with a few values overridable from the process
//! environment. Tunables of the ingestion pipeline live in [`SyncConfig`] and
//! are handed to the downloader and syncer at construction time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Key prefix used when the config file does not set one.
pub const DEFAULT_KEY_PREFIX: &str = "bitcoin-rest-mirror";

/// Environment variable overriding `redisUrl`.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("chain {0:?} is not configured")]
    UnknownChain(String),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    pub chains: BTreeMap<String, ChainConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Base URL of the upstream node's REST interface, e.g. `http://127.0.0.1:8332/rest`.
    pub rest_url: String,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
        }
    }
}

impl From<&ServerConfig> for SocketAddr {
    fn from(config: &ServerConfig) -> Self {
        SocketAddr::from((config.host, config.port))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9100,
        }
    }
}

/// Tunables of the download and commit pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Upper bound on heights held by the download window.
    pub max_blocks: usize,
    /// Upper bound on fetches running at once.
    pub concurrency: usize,
    /// Attempts per height across the whole hash-then-block protocol.
    pub retry_budget: u32,
    /// Pause after an undersized block body or a transport error.
    pub retry_backoff_ms: u64,
    /// Timeout of a single HTTP request to the upstream node.
    pub request_timeout_ms: u64,
    /// Number of commit workers. `0` picks the available parallelism.
    pub worker_count: usize,
    /// Jobs allowed in flight per worker before dispatch waits.
    pub in_flight_multiplier: usize,
    /// Pause between runs in follow mode.
    pub follow_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_blocks: 1000,
            concurrency: 32,
            retry_budget: 5,
            retry_backoff_ms: 1000,
            request_timeout_ms: 30_000,
            worker_count: 0,
            in_flight_multiplier: 5,
            follow_interval_ms: 1000,
        }
    }
}

impl SyncConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn follow_interval(&self) -> Duration {
        Duration::from_millis(self.follow_interval_ms)
    }

    /// Resolved worker count, never zero.
    pub fn workers(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Maximum number of jobs dispatched but not yet reported back.
    pub fn in_flight_limit(&self) -> usize {
        self.in_flight_multiplier * self.workers()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_blocks == 0 {
            return Err(ConfigError::Invalid("sync.maxBlocks must be positive"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("sync.concurrency must be positive"));
        }
        if self.retry_budget == 0 {
            return Err(ConfigError::Invalid("sync.retryBudget must be positive"));
        }
        if self.in_flight_multiplier == 0 {
            return Err(ConfigError::Invalid("sync.inFlightMultiplier must be positive"));
        }
        Ok(())
    }
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

impl Config {
    /// Read, apply environment overrides and validate.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply overrides from a variable lookup, normally the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(redis_url) = lookup(REDIS_URL_ENV).filter(|v| !v.is_empty()) {
            self.redis_url = redis_url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(ConfigError::Invalid("at least one chain must be configured"));
        }
        self.sync.validate()
    }

    pub fn chain(&self, name: &str) -> Result<&ChainConfig> {
        self.chains
            .get(name)
            .ok_or_else(|| ConfigError::UnknownChain(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
redisUrl: redis://127.0.0.1:6379
chains:
  BTC:
    restUrl: http://127.0.0.1:8332/rest
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.metrics, None);

        let chain = config.chain("BTC").unwrap();
        assert_eq!(chain.rest_url, "http://127.0.0.1:8332/rest");
        assert_eq!(chain.server.port, 8000);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_sync_section() {
        let yaml = format!("{MINIMAL}sync:\n  concurrency: 4\n  workerCount: 2\n");
        let config = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.sync.concurrency, 4);
        assert_eq!(config.sync.workers(), 2);
        assert_eq!(config.sync.in_flight_limit(), 10);
        assert_eq!(config.sync.max_blocks, 1000);
    }

    #[test]
    fn test_unknown_chain() {
        let config = Config::from_yaml_str(MINIMAL).unwrap();
        assert!(matches!(config.chain("LTC"), Err(ConfigError::UnknownChain(name)) if name == "LTC"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let yaml = format!("{MINIMAL}sync:\n  concurrency: 0\n");
        let config = Config::from_yaml_str(&yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_redis_override() {
        let mut config = Config::from_yaml_str(MINIMAL).unwrap();
        config.apply_overrides(|key| (key == REDIS_URL_ENV).then(|| "redis://cache:6379".to_string()));
        assert_eq!(config.redis_url, "redis://cache:6379");

        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config.redis_url, "redis://cache:6379");
    }

    #[test]
    fn test_auto_worker_count_is_positive() {
        assert!(SyncConfig::default().workers() > 0);
    }
}
