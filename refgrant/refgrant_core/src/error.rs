//! Error types for the reference grant engine.
//!
//! Errors are organized by concern, with the root `Error` able to wrap any
//! of them. Note that most runtime outcomes of the engine are *not* errors:
//! a stale event is discarded, a malformed grant is excluded from the index,
//! and a missing grant simply yields a denial.

use crate::types::GrantKey;
use thiserror::Error;

/// Root error type for the reference grant engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Grant validation errors
    #[error("Grant error: {0}")]
    Grant(#[from] GrantError),

    /// Wire schema and registration errors
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Event feed errors
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a grant is malformed.
///
/// A malformed grant is inert: it never enters the index and never
/// contributes to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    /// The grant lists no trusted sources
    #[error("grant {0} has no from entries")]
    EmptyFrom(GrantKey),

    /// The grant lists no allowed targets
    #[error("grant {0} has no to entries")]
    EmptyTo(GrantKey),

    /// An entry list exceeds the configured bound
    #[error("grant {key} lists {count} {list} entries (limit {limit})")]
    TooManyEntries {
        /// The offending grant
        key: GrantKey,
        /// Which list overflowed ("from" or "to")
        list: &'static str,
        /// Number of entries present
        count: usize,
        /// Configured maximum
        limit: usize,
    },

    /// An entry is missing its kind
    #[error("grant {key} has a {list} entry without a kind")]
    MissingKind {
        /// The offending grant
        key: GrantKey,
        /// Which list holds the entry ("from" or "to")
        list: &'static str,
    },

    /// A from entry is missing its namespace
    #[error("grant {0} has a from entry without a namespace")]
    MissingNamespace(GrantKey),

    /// The grant itself has no namespace or name
    #[error("grant identity is incomplete: {0:?}")]
    MissingIdentity(GrantKey),
}

/// Errors raised while decoding or registering the wire schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The API version is not registered
    #[error("unknown api version: {0}")]
    UnknownVersion(String),

    /// The kind is not registered
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    /// The API version is registered but no longer served
    #[error("api version {0} is not served")]
    NotServed(String),

    /// The document could not be decoded
    #[error("failed to decode {what}: {message}")]
    Decode {
        /// What was being decoded
        what: &'static str,
        /// Underlying decoder message
        message: String,
    },

    /// A resource version string is not a valid monotonic version
    #[error("invalid resource version: {0:?}")]
    InvalidResourceVersion(String),

    /// The registration table is inconsistent
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Decode {
            what: "document",
            message: err.to_string(),
        }
    }
}

/// Errors reported by an event feed.
///
/// Every feed error is treated as a disruption: the watcher marks decisions
/// provisional and performs a full relist once the feed is reachable again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The watch stream was interrupted
    #[error("feed disconnected: {0}")]
    Disconnected(String),

    /// The initial or recovery listing failed
    #[error("list failed: {0}")]
    ListFailed(String),
}

/// Errors related to configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration text could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but is not usable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
