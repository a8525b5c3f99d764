//! Configuration for the engine

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Upper bound on from/to entries per grant in the upstream schema.
pub const DEFAULT_MAX_ENTRIES: usize = 16;

/// Default number of revoked keys the reconciler remembers individually.
pub const DEFAULT_MAX_TOMBSTONES: usize = 4096;

/// Configuration for the grant index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum number of entries in either list of a grant
    pub max_entries_per_list: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_entries_per_list: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Configuration for the list/watch driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Delay before the first relist attempt after a disruption
    pub initial_backoff_ms: u64,

    /// Ceiling for the exponential relist backoff
    pub max_backoff_ms: u64,

    /// Whether stopping the watcher empties the index
    pub clear_index_on_stop: bool,

    /// Revoked keys remembered individually before the oldest are folded
    /// into a single version floor
    pub max_tombstones: usize,
}

impl WatcherConfig {
    /// Initial backoff as a duration
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Maximum backoff as a duration
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 200,
            max_backoff_ms: 30_000,
            clear_index_on_stop: true,
            max_tombstones: DEFAULT_MAX_TOMBSTONES,
        }
    }
}

/// Configuration for the logging subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base filter directive, e.g. `info` or `refgrant_sync=debug`
    pub level: String,

    /// Whether to emit JSON-structured logs
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
        }
    }
}

/// Master configuration for the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Index configuration
    pub index: IndexConfig,

    /// Watcher configuration
    pub watcher: WatcherConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.index.max_entries_per_list == 0 {
            return Err(ConfigError::Invalid(
                "index.max_entries_per_list must be at least 1".to_string(),
            ));
        }
        if self.watcher.initial_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "watcher.initial_backoff_ms must be positive".to_string(),
            ));
        }
        if self.watcher.max_tombstones == 0 {
            return Err(ConfigError::Invalid(
                "watcher.max_tombstones must be at least 1".to_string(),
            ));
        }
        if self.watcher.max_backoff_ms < self.watcher.initial_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "watcher.max_backoff_ms ({}) is below watcher.initial_backoff_ms ({})",
                self.watcher.max_backoff_ms, self.watcher.initial_backoff_ms
            )));
        }
        Ok(())
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.watcher.max_backoff_ms = 5_000;
        config
    }

    /// Create a minimal configuration for testing
    pub fn minimal_for_testing() -> Self {
        let mut config = Self::default();
        config.logging.level = "warn".to_string();
        config.watcher.initial_backoff_ms = 1;
        config.watcher.max_backoff_ms = 10;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.index.max_entries_per_list, 16);
        assert_eq!(config.watcher.initial_backoff(), Duration::from_millis(200));
        assert!(config.watcher.clear_index_on_stop);
        assert_eq!(config.watcher.max_tombstones, DEFAULT_MAX_TOMBSTONES);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [watcher]
            max_backoff_ms = 1000

            [logging]
            structured = true
            "#,
        )
        .unwrap();

        assert_eq!(config.watcher.max_backoff_ms, 1000);
        assert_eq!(config.watcher.initial_backoff_ms, 200);
        assert!(config.logging.structured);
        assert_eq!(config.index, IndexConfig::default());
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        let result = EngineConfig::from_toml_str(
            r#"
            [watcher]
            initial_backoff_ms = 500
            max_backoff_ms = 100
            "#,
        );
        assert!(matches!(result, Err(Error::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_zero_tombstone_limit_rejected() {
        let result = EngineConfig::from_toml_str("[watcher]\nmax_tombstones = 0");
        assert!(matches!(result, Err(Error::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_unparseable_toml_rejected() {
        let result = EngineConfig::from_toml_str("[index\nmax_entries_per_list = ");
        assert!(matches!(result, Err(Error::Config(ConfigError::Parse(_)))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[index]\nmax_entries_per_list = 4").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.index.max_entries_per_list, 4);
    }

    #[test]
    fn test_presets() {
        assert_eq!(EngineConfig::development().logging.level, "debug");
        let testing = EngineConfig::minimal_for_testing();
        assert!(testing.validate().is_ok());
        assert_eq!(testing.watcher.max_backoff(), Duration::from_millis(10));
    }
}
