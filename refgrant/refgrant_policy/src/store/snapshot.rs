//! Immutable per-namespace views of the index.

use std::collections::BTreeMap;
use std::sync::Arc;

use refgrant_core::{Grant, GrantKey};

/// Grants of one namespace, keyed by grant name.
pub(crate) type GrantMap = BTreeMap<String, Arc<Grant>>;

/// Every grant active in one target namespace at a single point in time.
///
/// A snapshot never changes after it is taken: later upserts and deletes
/// produce new snapshots and leave this one untouched.
#[derive(Debug, Clone)]
pub struct GrantSnapshot {
    namespace: String,
    grants: Arc<GrantMap>,
}

impl GrantSnapshot {
    pub(crate) fn new(namespace: impl Into<String>, grants: Arc<GrantMap>) -> Self {
        Self {
            namespace: namespace.into(),
            grants,
        }
    }

    /// A snapshot of a namespace that holds no grants.
    pub fn empty(namespace: impl Into<String>) -> Self {
        Self::new(namespace, Arc::new(GrantMap::new()))
    }

    /// The namespace this snapshot covers.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether the namespace had no active grants.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Number of active grants.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Look up a grant by name.
    pub fn get(&self, name: &str) -> Option<&Grant> {
        self.grants.get(name).map(|grant| grant.as_ref())
    }

    /// Grants in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.grants.values().map(|grant| grant.as_ref())
    }

    /// Keys of the grants in name order.
    pub fn keys(&self) -> impl Iterator<Item = GrantKey> + '_ {
        self.grants
            .keys()
            .map(move |name| GrantKey::new(self.namespace.clone(), name.clone()))
    }
}
