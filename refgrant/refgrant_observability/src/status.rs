//! Sync-state signal for the grant index.
//!
//! Decisions are only authoritative while the index is known to match the
//! event feed. Whenever it might not (before the first listing, or while a
//! relist after a feed disruption is pending), the status says so, and
//! every decision served in the meantime is marked provisional.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Synchronization state of the index relative to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SyncState {
    /// No complete listing has been applied yet.
    Unsynced = 0,
    /// The index reflects the feed.
    Synced = 1,
    /// The feed was disrupted and a relist is pending or running.
    Resyncing = 2,
    /// The watcher was stopped; the index is no longer maintained.
    Stopped = 3,
}

impl SyncState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Synced,
            2 => Self::Resyncing,
            3 => Self::Stopped,
            _ => Self::Unsynced,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsynced => write!(f, "unsynced"),
            Self::Synced => write!(f, "synced"),
            Self::Resyncing => write!(f, "resyncing"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Point-in-time copy of the sync counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetrics {
    /// Current state
    pub state: SyncState,
    /// When the state last changed
    pub last_transition: DateTime<Utc>,
    /// Events that changed the index
    pub events_applied: u64,
    /// Stale or duplicate events that were discarded
    pub events_stale: u64,
    /// Malformed grants kept out of the index
    pub grants_rejected: u64,
    /// Completed relists
    pub resyncs: u64,
    /// Grants revoked because a relist no longer contained them
    pub revoked_by_resync: u64,
}

struct Inner {
    state: AtomicU8,
    last_transition: Mutex<DateTime<Utc>>,
    events_applied: AtomicU64,
    events_stale: AtomicU64,
    grants_rejected: AtomicU64,
    resyncs: AtomicU64,
    revoked_by_resync: AtomicU64,
}

/// Shared handle to the sync state.
///
/// Clones observe and update the same state.
#[derive(Clone)]
pub struct SyncStatus {
    inner: Arc<Inner>,
}

impl SyncStatus {
    /// Create a status in the [`SyncState::Unsynced`] state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(SyncState::Unsynced as u8),
                last_transition: Mutex::new(Utc::now()),
                events_applied: AtomicU64::new(0),
                events_stale: AtomicU64::new(0),
                grants_rejected: AtomicU64::new(0),
                resyncs: AtomicU64::new(0),
                revoked_by_resync: AtomicU64::new(0),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        SyncState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Whether decisions made now reflect the feed.
    pub fn is_authoritative(&self) -> bool {
        self.state() == SyncState::Synced
    }

    /// When the state last changed.
    pub fn last_transition(&self) -> DateTime<Utc> {
        *self.inner.last_transition.lock()
    }

    fn transition(&self, next: SyncState) -> SyncState {
        let previous = SyncState::from_u8(self.inner.state.swap(next as u8, Ordering::AcqRel));
        if previous != next {
            *self.inner.last_transition.lock() = Utc::now();
        }
        previous
    }

    /// The index now reflects a complete listing.
    pub fn mark_synced(&self) {
        let previous = self.transition(SyncState::Synced);
        if previous != SyncState::Synced {
            info!(from = %previous, "grant index synchronized; decisions are authoritative");
        }
    }

    /// The feed was disrupted; decisions are provisional until the next
    /// complete listing.
    pub fn mark_resyncing(&self, reason: &str) {
        let previous = self.transition(SyncState::Resyncing);
        if previous != SyncState::Resyncing {
            warn!(
                from = %previous,
                reason,
                "grant index may be stale; decisions are provisional until relist completes"
            );
        }
    }

    /// The watcher stopped maintaining the index.
    pub fn mark_stopped(&self) {
        let previous = self.transition(SyncState::Stopped);
        if previous != SyncState::Stopped {
            info!(from = %previous, "grant watcher stopped");
        }
    }

    /// Count an event that changed the index.
    pub fn record_applied(&self) {
        self.inner.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a discarded stale or duplicate event.
    pub fn record_stale(&self) {
        self.inner.events_stale.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a malformed grant.
    pub fn record_rejected(&self) {
        self.inner.grants_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a completed relist and the grants it revoked.
    pub fn record_resync(&self, revoked: u64) {
        self.inner.resyncs.fetch_add(1, Ordering::Relaxed);
        self.inner
            .revoked_by_resync
            .fetch_add(revoked, Ordering::Relaxed);
    }

    /// Snapshot the counters.
    pub fn metrics(&self) -> SyncMetrics {
        SyncMetrics {
            state: self.state(),
            last_transition: self.last_transition(),
            events_applied: self.inner.events_applied.load(Ordering::Relaxed),
            events_stale: self.inner.events_stale.load(Ordering::Relaxed),
            grants_rejected: self.inner.grants_rejected.load(Ordering::Relaxed),
            resyncs: self.inner.resyncs.load(Ordering::Relaxed),
            revoked_by_resync: self.inner.revoked_by_resync.load(Ordering::Relaxed),
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncStatus")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unsynced() {
        let status = SyncStatus::new();
        assert_eq!(status.state(), SyncState::Unsynced);
        assert!(!status.is_authoritative());
    }

    #[test]
    fn test_transitions_are_shared_between_clones() {
        let status = SyncStatus::new();
        let observer = status.clone();

        status.mark_synced();
        assert!(observer.is_authoritative());

        status.mark_resyncing("watch stream closed");
        assert_eq!(observer.state(), SyncState::Resyncing);
        assert!(!observer.is_authoritative());

        status.mark_synced();
        status.mark_stopped();
        assert_eq!(observer.state(), SyncState::Stopped);
    }

    #[test]
    fn test_last_transition_only_moves_on_change() {
        let status = SyncStatus::new();
        status.mark_synced();
        let first = status.last_transition();
        status.mark_synced();
        assert_eq!(status.last_transition(), first);
    }

    #[test]
    fn test_metrics_snapshot() {
        let status = SyncStatus::new();
        status.record_applied();
        status.record_applied();
        status.record_stale();
        status.record_rejected();
        status.record_resync(3);
        status.mark_synced();

        let metrics = status.metrics();
        assert_eq!(metrics.state, SyncState::Synced);
        assert_eq!(metrics.events_applied, 2);
        assert_eq!(metrics.events_stale, 1);
        assert_eq!(metrics.grants_rejected, 1);
        assert_eq!(metrics.resyncs, 1);
        assert_eq!(metrics.revoked_by_resync, 3);

        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"state\":\"Synced\""));
    }
}
