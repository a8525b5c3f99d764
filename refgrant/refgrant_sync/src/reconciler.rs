//! Event reconciliation.
//!
//! The reconciler is the only writer of the grant index. It applies
//! add/modify/delete events in feed order, discards deliveries that are not
//! newer than what the index already holds, and replays full listings after
//! a feed disruption.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use refgrant_core::config::DEFAULT_MAX_TOMBSTONES;
use refgrant_core::{Grant, GrantError, GrantEvent, GrantKey, GrantListing, ResourceVersion};
use refgrant_observability::SyncStatus;
use refgrant_policy::{GrantIndex, GrantStore, UpsertOutcome};

/// What applying one event did to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The grant was inserted or replaced.
    Applied,

    /// The event was not newer than the stored state and was discarded.
    Stale,

    /// The grant was malformed. Any previously active version of the key
    /// was revoked.
    Rejected(GrantError),

    /// The grant was removed.
    Deleted,

    /// A deletion arrived for a key that was not active. Nothing is
    /// remembered about the key.
    AlreadyAbsent,
}

impl ApplyOutcome {
    /// Whether the index changed.
    pub fn changed_index(&self) -> bool {
        matches!(self, Self::Applied | Self::Deleted)
    }
}

/// Lifecycle state of one grant key as seen by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    /// Never seen, or forgotten by a relist.
    Unknown,

    /// Present in the index.
    Active,

    /// Removed; only a strictly newer version can bring the key back.
    Revoked,
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Active => write!(f, "active"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

/// Summary of one relist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncReport {
    /// Collection version of the listing.
    pub version: ResourceVersion,

    /// Listed grants that were inserted or replaced.
    pub upserted: usize,

    /// Listed grants the index already held at the same or a newer version.
    pub unchanged: usize,

    /// Indexed grants removed because the listing no longer contained them
    /// or because their listed version was malformed.
    pub revoked: usize,

    /// Listed grants that were malformed.
    pub rejected: usize,
}

/// Applies feed events and listings to a grant store.
pub struct Reconciler<S = GrantIndex> {
    /// The store being maintained.
    store: Arc<S>,

    /// Sync state reported to evaluators.
    status: SyncStatus,

    /// Version at which each revoked key became inactive.
    tombstones: DashMap<GrantKey, ResourceVersion>,

    /// Tombstones kept before the oldest are folded into `floor`.
    max_tombstones: usize,

    /// Highest version of any forgotten tombstone. Unindexed keys cannot be
    /// added at or below it.
    floor: AtomicU64,
}

impl<S> Reconciler<S>
where
    S: GrantStore,
{
    /// Create a reconciler for a store.
    pub fn new(store: Arc<S>, status: SyncStatus) -> Self {
        Self {
            store,
            status,
            tombstones: DashMap::new(),
            max_tombstones: DEFAULT_MAX_TOMBSTONES,
            floor: AtomicU64::new(0),
        }
    }

    /// Bound the number of revoked keys remembered individually.
    ///
    /// When the bound is exceeded the older half is forgotten and its
    /// highest version becomes the floor below which unindexed keys are
    /// treated as stale.
    pub fn with_tombstone_limit(mut self, limit: usize) -> Self {
        self.max_tombstones = limit.max(1);
        self
    }

    /// The store being maintained.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Sync state of the store.
    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Lifecycle state of a key.
    pub fn key_state(&self, key: &GrantKey) -> KeyState {
        if self.store.version_of(key).is_some() {
            KeyState::Active
        } else if self.tombstones.contains_key(key) {
            KeyState::Revoked
        } else {
            KeyState::Unknown
        }
    }

    /// Number of revoked keys currently remembered.
    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    /// Version at or below which grants for unindexed keys are discarded.
    pub fn floor(&self) -> ResourceVersion {
        ResourceVersion(self.floor.load(Ordering::Acquire))
    }

    /// Apply one watch event.
    ///
    /// # Arguments
    ///
    /// * `event` - The event, in feed order.
    ///
    /// # Returns
    ///
    /// What the event did. Nothing here is an error: stale and malformed
    /// deliveries are reported and counted, never propagated.
    pub fn apply(&self, event: GrantEvent) -> ApplyOutcome {
        let outcome = match event {
            GrantEvent::Added(grant) | GrantEvent::Modified(grant) => self.apply_upsert(grant),
            GrantEvent::Deleted { key, version } => self.apply_delete(&key, version),
        };

        match &outcome {
            ApplyOutcome::Applied | ApplyOutcome::Deleted => self.status.record_applied(),
            ApplyOutcome::Stale | ApplyOutcome::AlreadyAbsent => self.status.record_stale(),
            ApplyOutcome::Rejected(_) => self.status.record_rejected(),
        }
        outcome
    }

    fn apply_upsert(&self, grant: Grant) -> ApplyOutcome {
        let key = grant.key().clone();
        let version = grant.version();

        if let Some(revoked_at) = self.tombstone(&key) {
            if version <= revoked_at {
                trace!(grant = %key, %version, %revoked_at, "discarding event for revoked grant");
                return ApplyOutcome::Stale;
            }
        }

        let current = self.store.snapshot(&key.namespace);
        let stored = current.get(&key.name);
        let floor = self.floor();
        if stored.is_none() && floor > ResourceVersion::ZERO && version <= floor {
            trace!(grant = %key, %version, %floor, "discarding event below tombstone floor");
            return ApplyOutcome::Stale;
        }
        if let Some(stored) = stored {
            if version <= stored.version() {
                trace!(grant = %key, %version, stored = %stored.version(), "discarding stale event");
                return ApplyOutcome::Stale;
            }
            if let (Some(old), Some(new)) = (stored.uid(), grant.uid()) {
                if old != new {
                    info!(grant = %key, %old, %new, "grant was recreated");
                }
            }
        }
        let was_active = stored.is_some();

        match self.store.upsert(grant) {
            UpsertOutcome::Inserted | UpsertOutcome::Replaced { .. } => {
                self.tombstones.remove(&key);
                ApplyOutcome::Applied
            }
            UpsertOutcome::Rejected(reason) => {
                if was_active {
                    warn!(grant = %key, %version, "revoking grant whose update is malformed");
                    self.store.delete(&key.namespace, &key.name);
                    self.bury(&key, version);
                }
                ApplyOutcome::Rejected(reason)
            }
        }
    }

    fn apply_delete(&self, key: &GrantKey, version: ResourceVersion) -> ApplyOutcome {
        match self.store.delete(&key.namespace, &key.name) {
            Some(removed) => {
                self.bury(key, version.max(removed.version()));
                debug!(grant = %key, %version, "grant revoked");
                ApplyOutcome::Deleted
            }
            None => {
                trace!(grant = %key, %version, "deletion of inactive grant");
                ApplyOutcome::AlreadyAbsent
            }
        }
    }

    /// Mark the index as possibly stale ahead of a relist.
    ///
    /// Evaluators keep serving the current index, flagged provisional.
    pub fn begin_resync(&self, reason: &str) {
        self.status.mark_resyncing(reason);
    }

    /// Reconcile the index against a complete listing.
    ///
    /// Every indexed key absent from the listing is revoked first, then
    /// every listed grant newer than its indexed version is upserted. The
    /// listing is authoritative, so tombstones from before it are
    /// forgotten.
    pub fn resync(&self, listing: GrantListing) -> ResyncReport {
        if self.status.is_authoritative() {
            self.status.mark_resyncing("relist in progress");
        }

        let mut report = ResyncReport {
            version: listing.version,
            ..ResyncReport::default()
        };
        self.tombstones.clear();

        let listed: BTreeSet<GrantKey> = listing
            .grants
            .iter()
            .map(|grant| grant.key().clone())
            .collect();

        for key in self.store.keys() {
            if listed.contains(&key) {
                continue;
            }
            if let Some(removed) = self.store.delete(&key.namespace, &key.name) {
                debug!(grant = %key, version = %removed.version(), "grant absent from relist; revoked");
                self.bury(&key, listing.version.max(removed.version()));
                report.revoked += 1;
            }
        }

        for grant in listing.grants {
            let key = grant.key().clone();
            let version = grant.version();
            let stored = self.store.version_of(&key);
            if stored.is_some_and(|stored| version <= stored) {
                report.unchanged += 1;
                continue;
            }

            match self.store.upsert(grant) {
                UpsertOutcome::Inserted | UpsertOutcome::Replaced { .. } => report.upserted += 1,
                UpsertOutcome::Rejected(_) => {
                    report.rejected += 1;
                    self.status.record_rejected();
                    if stored.is_some() && self.store.delete(&key.namespace, &key.name).is_some() {
                        report.revoked += 1;
                        self.bury(&key, version);
                    }
                }
            }
        }

        self.status.record_resync(report.revoked as u64);
        self.status.mark_synced();
        info!(
            version = %report.version,
            upserted = report.upserted,
            unchanged = report.unchanged,
            revoked = report.revoked,
            rejected = report.rejected,
            "relist reconciled"
        );
        report
    }

    fn tombstone(&self, key: &GrantKey) -> Option<ResourceVersion> {
        self.tombstones.get(key).map(|entry| *entry.value())
    }

    fn bury(&self, key: &GrantKey, version: ResourceVersion) {
        self.tombstones
            .entry(key.clone())
            .and_modify(|existing| *existing = (*existing).max(version))
            .or_insert(version);
        if self.tombstones.len() > self.max_tombstones {
            self.prune();
        }
    }

    /// Forget the older half of the tombstones, raising the floor to the
    /// highest version forgotten.
    fn prune(&self) {
        let mut buried: Vec<(ResourceVersion, GrantKey)> = self
            .tombstones
            .iter()
            .map(|entry| (*entry.value(), entry.key().clone()))
            .collect();
        buried.sort_unstable();

        let forget = buried.len() - self.max_tombstones / 2;
        let mut highest = ResourceVersion::ZERO;
        for (version, key) in buried.into_iter().take(forget) {
            self.tombstones.remove(&key);
            highest = highest.max(version);
        }
        self.floor.fetch_max(highest.0, Ordering::AcqRel);
        debug!(forgotten = forget, floor = %self.floor(), "pruned tombstones");
    }
}
