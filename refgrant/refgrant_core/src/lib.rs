//! # Refgrant Core
//!
//! `refgrant_core` provides the building blocks shared by the reference
//! grant engine: the grant data model, the wire schema and its version
//! registration table, error types, and configuration.
//!
//! A *grant* is a trust declaration published in a target namespace. It
//! names the source namespaces and kinds that may reference objects in the
//! grant's own namespace, and which target kinds (optionally a single named
//! object) they may reference.
//!
//! ## Crate Structure
//!
//! - **types**: Grants, entries, reference endpoints and feed records
//! - **api**: Versioned wire schema and the static registration table
//! - **error**: Error types for all engine components
//! - **config**: Engine configuration, loadable from TOML

pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineConfig, IndexConfig, LoggingConfig, WatcherConfig};
pub use error::{ConfigError, Error, FeedError, GrantError, Result, SchemaError};
pub use types::{
    EventKind, FromEntry, Grant, GrantEvent, GrantKey, GrantListing, ReferenceTriple,
    ResourceVersion, TargetName, ToEntry, CORE_GROUP,
};
