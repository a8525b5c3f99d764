//! # Refgrant Sync
//!
//! `refgrant_sync` keeps the grant index consistent with an external
//! list/watch feed.
//!
//! Key concepts:
//!
//! 1. **Reconciler**: Applies add/modify/delete events in feed order and
//!    discards anything not newer than the index. Revoked keys are
//!    remembered so that late deliveries cannot bring them back.
//!
//! 2. **Relist**: After a feed disruption the full listing is diffed
//!    against the index. Keys missing from it are revoked. Until the relist
//!    completes, decisions are marked provisional.
//!
//! 3. **Watcher**: A tokio task that drives a feed into the reconciler,
//!    with exponential backoff between relists and an explicit stop that
//!    releases the index.

pub mod engine;
pub mod feed;
pub mod reconciler;
pub mod watcher;

pub use engine::ReferenceGrantEngine;
pub use feed::{GrantFeed, MemoryFeed, MemoryFeedHandle};
pub use reconciler::{ApplyOutcome, KeyState, Reconciler, ResyncReport};
pub use watcher::{GrantWatcher, WatchExit, WatcherHandle};
