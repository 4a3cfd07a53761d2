//! Service configuration loaded from config.toml
//!
//! Every section has defaults, so a partial file (or none) yields a runnable single-node setup:
//! in-memory fast store, in-process precompute, no database, HTTP on port 8080.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::constants::DEFAULT_AVERAGE_TTL_SECONDS;
use crate::historical::{HistoricalStoreConfig, InstrumentFilter, InstrumentFilterConfig, PrecomputeClientConfig};
use crate::logging::{LoggingConfig, LoggingTomlConfig};
use crate::postgres::PostgresConfig;
use crate::rvol::RvolSettings;
use crate::session::SessionConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid session configuration: {0}")]
    InvalidSession(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Fast store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FastStoreBackend {
    Memory,
    Lmdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FastStoreConfig {
    pub backend: FastStoreBackend,
    /// LMDB environment directory (lmdb backend only)
    pub lmdb_path: PathBuf,
    /// Lifetime of a precomputed historical-average entry
    pub ttl_seconds: u64,
    /// How long a successful bulk precompute suppresses re-triggering; defaults to the TTL
    pub retrigger_cooldown_seconds: Option<u64>,
    /// Interval of the expired-entry sweep, 0 disables it
    pub purge_interval_seconds: u64,
}

impl Default for FastStoreConfig {
    fn default() -> Self {
        Self {
            backend: FastStoreBackend::Memory,
            lmdb_path: PathBuf::from("lmdb_data/historical_averages"),
            ttl_seconds: DEFAULT_AVERAGE_TTL_SECONDS,
            retrigger_cooldown_seconds: None,
            purge_interval_seconds: 900,
        }
    }
}

impl FastStoreConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn store_config(&self) -> HistoricalStoreConfig {
        HistoricalStoreConfig {
            retrigger_cooldown_seconds: self.retrigger_cooldown_seconds.unwrap_or(self.ttl_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Daily lifecycle times, wall-clock in the session timezone
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// When today's volume cache is cleared for the new session
    pub reset_time: NaiveTime,
    /// When the nightly precompute for the whole universe runs
    pub nightly_precompute_time: NaiveTime,
    pub tick_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reset_time: NaiveTime::from_hms_opt(3, 55, 0).unwrap_or_default(),
            nightly_precompute_time: NaiveTime::from_hms_opt(3, 30, 0).unwrap_or_default(),
            tick_interval_seconds: 30,
        }
    }
}

/// Symbols covered by the nightly precompute
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Always precomputed, in addition to symbols active in the source
    pub symbols: Vec<String>,
    /// A symbol is active if it has any recording within this many days
    pub active_within_days: u32,
    pub nightly_concurrency: usize,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            active_within_days: 14,
            nightly_concurrency: 16,
        }
    }
}

/// Full TOML configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub rvol: RvolSettings,
    pub session: SessionConfig,
    pub filter: InstrumentFilterConfig,
    pub fast_store: FastStoreConfig,
    pub precompute_client: PrecomputeClientConfig,
    pub database: PostgresConfig,
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub universe: UniverseConfig,
    logging: LoggingTomlConfig,
}

impl ServiceConfig {
    /// Load configuration from a config.toml file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from(self.logging.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        if self.rvol.lookback_days == 0 {
            return Err(ConfigError::Invalid("rvol.lookback_days must be positive".to_string()));
        }
        if self.fast_store.ttl_seconds == 0 {
            return Err(ConfigError::Invalid("fast_store.ttl_seconds must be positive".to_string()));
        }
        if self.precompute_client.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "precompute_client.max_connections must be positive".to_string(),
            ));
        }
        if self.scheduler.tick_interval_seconds == 0 {
            return Err(ConfigError::Invalid("scheduler.tick_interval_seconds must be positive".to_string()));
        }
        InstrumentFilter::new(&self.filter)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogRotation;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(config.rvol.lookback_days, 10);
        assert_eq!(config.session.slot_minutes, 5);
        assert_eq!(config.fast_store.backend, FastStoreBackend::Memory);
        assert_eq!(config.fast_store.ttl(), Duration::from_secs(28_800));
        assert_eq!(config.fast_store.store_config().retrigger_cooldown_seconds, 28_800);
        assert!(config.precompute_client.base_url.is_none());
        assert!(!config.database.enabled);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging_config().rotation, LogRotation::Daily);
    }

    #[test]
    fn test_full_file() {
        let toml = r#"
            [rvol]
            lookback_days = 20
            batch_concurrency = 8

            [session]
            slot_minutes = 1
            extended_hours = false
            timezone = "America/Chicago"
            regular_open = "08:30:00"
            regular_close = "15:00:00"

            [filter]
            excluded_symbols = ["ZVZZT"]

            [fast_store]
            backend = "lmdb"
            lmdb_path = "/var/lib/rvol"
            ttl_seconds = 3600
            retrigger_cooldown_seconds = 600

            [precompute_client]
            base_url = "http://precompute.internal:9000"
            max_connections = 32

            [scheduler]
            reset_time = "03:00:00"

            [universe]
            symbols = ["SPY", "QQQ"]

            [logging]
            rotation = "hourly"
        "#;

        let config = ServiceConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.rvol.lookback_days, 20);
        assert_eq!(config.session.timezone, chrono_tz::America::Chicago);
        assert!(!config.session.extended_hours);
        assert_eq!(config.filter.excluded_symbols, vec!["ZVZZT".to_string()]);
        assert_eq!(config.fast_store.backend, FastStoreBackend::Lmdb);
        assert_eq!(config.fast_store.store_config().retrigger_cooldown_seconds, 600);
        assert_eq!(config.precompute_client.max_connections, 32);
        assert_eq!(config.scheduler.reset_time, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
        assert_eq!(config.universe.symbols.len(), 2);
        assert_eq!(config.logging_config().rotation, LogRotation::Hourly);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServiceConfig::from_toml_str("[session]\nslot_minutes = 0"),
            Err(ConfigError::InvalidSession(_))
        ));
        assert!(matches!(
            ServiceConfig::from_toml_str("[rvol]\nlookback_days = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServiceConfig::from_toml_str("[fast_store]\nbackend = \"redis\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ServiceConfig::from_toml_str("[filter]\npatterns = ['^[A-Z{3,}$']"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            ServiceConfig::from_toml("/nonexistent/config.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
