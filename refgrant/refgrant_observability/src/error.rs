//! Error types for the observability system

use thiserror::Error;

/// Error type for observability operations
#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// Failed to initialize observability component
    #[error("Failed to initialize observability component: {0}")]
    InitializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),
}
