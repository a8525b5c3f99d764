//! Structured logging setup
//!
//! Every crate in the engine logs through `tracing` macros. This module
//! installs the process-wide subscriber that renders those events.

use refgrant_core::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::error::ObservabilityError;
use crate::Result;

/// Build the filter for a logging configuration.
///
/// `RUST_LOG` is not consulted; the configuration is the single source.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(&config.level).map_err(|e| {
        ObservabilityError::ConfigurationError(format!(
            "invalid log level {:?}: {}",
            config.level, e
        ))
    })
}

/// Install the global `tracing` subscriber.
///
/// Installing twice is reported as an error rather than a panic, so tests
/// and embedding applications can call this freely.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if config.structured {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ObservabilityError::InitializationError(e.to_string()))
}
