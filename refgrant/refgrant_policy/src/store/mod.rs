//! Grant storage.
//!
//! This module provides the concurrent, namespace-keyed store of active
//! grants.

mod index;
mod snapshot;

pub use index::GrantIndex;
pub use snapshot::GrantSnapshot;

use refgrant_core::{Grant, GrantError, GrantKey, ResourceVersion};
use std::sync::Arc;

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The key was not present before.
    Inserted,

    /// An existing grant was replaced.
    Replaced {
        /// The grant that is no longer visible
        previous: Arc<Grant>,
    },

    /// The grant was malformed and the store was left unchanged.
    Rejected(GrantError),
}

/// Trait for grant storage.
///
/// A grant store owns the storage of grants but has no authority over
/// their content. Implementations must guarantee that once `delete`
/// returns, no later `snapshot` can observe the deleted grant.
pub trait GrantStore: Send + Sync {
    /// Insert or replace the grant keyed by its namespace and name.
    ///
    /// Malformed grants are rejected without touching the store.
    fn upsert(&self, grant: Grant) -> UpsertOutcome;

    /// Remove a grant. Removing an absent grant is a no-op.
    ///
    /// # Returns
    ///
    /// The removed grant, if one was present.
    fn delete(&self, namespace: &str, name: &str) -> Option<Arc<Grant>>;

    /// All grants currently active for a target namespace.
    fn snapshot(&self, namespace: &str) -> GrantSnapshot;

    /// Keys of every active grant.
    fn keys(&self) -> Vec<GrantKey>;

    /// Remove every grant.
    fn clear(&self);

    /// Version of the grant currently stored under `key`.
    fn version_of(&self, key: &GrantKey) -> Option<ResourceVersion> {
        self.snapshot(&key.namespace)
            .get(&key.name)
            .map(Grant::version)
    }

    /// Number of active grants.
    fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether no grant is active.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
