use crate::error::Result;
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Search engine and storefront query configuration
    #[validate(nested)]
    pub search: SearchConfig,

    /// Backlog store configuration
    pub backlog: BacklogConfig,

    /// Synchronizer configuration
    #[validate(nested)]
    pub sync: SyncConfig,

    /// Primary-store seed data
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: WEBSHOP_SEARCH__)
            .add_source(
                config::Environment::with_prefix("WEBSHOP_SEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            backlog: BacklogConfig::default(),
            sync: SyncConfig::default(),
            catalog: CatalogConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogConfig {
    /// Backlog backend type
    #[serde(default)]
    pub backend: BacklogBackend,

    /// Path for the embedded database (sled)
    pub path: Option<PathBuf>,

    /// Claim lease for drained entries (seconds)
    #[serde(default = "default_lease_secs")]
    pub lease_secs: i64,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            backend: BacklogBackend::default(),
            path: Some(PathBuf::from("./data/backlog")),
            lease_secs: default_lease_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BacklogBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    /// Entries drained per batch
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 10000))]
    pub batch_size: usize,

    /// Cron expression (with seconds) for scheduled runs
    #[serde(default = "default_schedule")]
    #[validate(length(min = 1))]
    pub schedule: String,

    /// Enable scheduled synchronization
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            schedule: default_schedule(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON catalog snapshot imported into the in-memory catalog at startup
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_lease_secs() -> i64 {
    crate::backlog::DEFAULT_LEASE_SECS
}

fn default_batch_size() -> usize {
    100
}

fn default_schedule() -> String {
    "*/30 * * * * *".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "webshop-search".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_batch_size(), 100);
        assert_eq!(default_lease_secs(), 300);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_backlog_backend() {
        assert_eq!(BacklogBackend::default(), BacklogBackend::Sled);
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.sync.batch_size, 100);
        assert_eq!(config.search.timeout_secs, 5);
        assert_eq!(config.search.per_page, 10);
        assert_eq!(config.search.index_name, "webshop");
        assert!(config.catalog.snapshot_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut config = Config::default();
        config.sync.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
