//! Reference evaluation engine.
//!
//! This module answers whether a cross-namespace reference is currently
//! permitted. Every call reads a fresh snapshot of the target namespace; no
//! decision is cached, so a revoked grant stops admitting references on
//! the very next call.

use std::sync::Arc;

use refgrant_core::{GrantKey, ReferenceTriple};
use refgrant_observability::SyncStatus;
use tracing::trace;

use crate::model::{Evaluation, Verdict};
use crate::store::{GrantIndex, GrantSnapshot, GrantStore};

/// Reference evaluation engine.
///
/// The evaluator holds no state of its own beyond shared handles, so it is
/// cheap to clone and safe to call from any number of threads.
pub struct GrantEvaluator<S = GrantIndex> {
    /// The grant store.
    store: Arc<S>,

    /// Sync state of the store, used to flag provisional decisions.
    status: SyncStatus,
}

impl<S> GrantEvaluator<S>
where
    S: GrantStore,
{
    /// Create a new evaluator.
    ///
    /// # Arguments
    ///
    /// * `store` - The grant store to read.
    /// * `status` - Sync state of that store.
    ///
    /// # Returns
    ///
    /// A new evaluator.
    pub fn new(store: Arc<S>, status: SyncStatus) -> Self {
        Self { store, status }
    }

    /// The store this evaluator reads.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The sync status this evaluator reports against.
    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Decide whether `from` may reference `to`.
    pub fn allowed(&self, from: &ReferenceTriple, to: &ReferenceTriple) -> Verdict {
        let snapshot = self.store.snapshot(&to.namespace);
        Verdict::from(first_match(&snapshot, from, to).is_some())
    }

    /// Decide whether `from` may reference `to`, with diagnostics.
    ///
    /// # Arguments
    ///
    /// * `from` - The referencing object.
    /// * `to` - The referenced object.
    ///
    /// # Returns
    ///
    /// The evaluation, naming the first admitting grant in name order and
    /// marked provisional unless the store is known to be in sync.
    pub fn evaluate(&self, from: &ReferenceTriple, to: &ReferenceTriple) -> Evaluation {
        let provisional = !self.status.is_authoritative();
        let snapshot = self.store.snapshot(&to.namespace);
        let matched = first_match(&snapshot, from, to);

        trace!(
            from = %from,
            to = %to,
            grants = snapshot.len(),
            matched = matched.as_ref().map(|key| key.name.as_str()).unwrap_or("-"),
            provisional,
            "evaluated reference"
        );

        Evaluation::new(from.clone(), to.clone(), matched, provisional)
    }
}

impl<S> Clone for GrantEvaluator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            status: self.status.clone(),
        }
    }
}

/// Key of the first grant in the snapshot that admits the reference.
///
/// The snapshot only holds grants owned by `to.namespace`, so a match can
/// never admit a reference out of another namespace.
fn first_match(
    snapshot: &GrantSnapshot,
    from: &ReferenceTriple,
    to: &ReferenceTriple,
) -> Option<GrantKey> {
    if snapshot.is_empty() {
        return None;
    }
    snapshot
        .iter()
        .find(|grant| grant.admits(from, to))
        .map(|grant| grant.key().clone())
}
