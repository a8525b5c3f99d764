//! # Refgrant Observability
//!
//! Logging setup and the sync-state signal for the reference grant engine.
//!
//! - **Logging**: `tracing` events rendered by a `tracing-subscriber`
//!   formatter, plain or JSON-structured
//! - **Sync status**: whether the grant index currently reflects the event
//!   feed, plus counters describing how it got there

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Re-export tracing for convenience
pub use tracing;

pub mod error;
pub mod logging;
pub mod status;

pub use error::ObservabilityError;
pub use status::{SyncMetrics, SyncState, SyncStatus};

/// Result type for observability operations
pub type Result<T> = std::result::Result<T, ObservabilityError>;
