//! Event feeds.
//!
//! A feed is the list/watch source of grants: `list` returns every grant
//! that exists, `next_event` returns incremental changes after it. Feeds
//! are owned by a single watcher, so their methods take `&mut self`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use refgrant_core::{FeedError, Grant, GrantEvent, GrantKey, GrantListing, ResourceVersion};

/// A list/watch source of grants.
#[async_trait]
pub trait GrantFeed: Send {
    /// Fetch a complete listing.
    ///
    /// Events returned by [`GrantFeed::next_event`] afterwards describe
    /// changes made after the listing was taken.
    async fn list(&mut self) -> Result<GrantListing, FeedError>;

    /// Wait for the next change.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(event))` - The next event, in version order.
    /// * `Ok(None)` - The feed is closed and will deliver nothing more.
    /// * `Err` - The watch was disrupted; events may have been missed and a
    ///   relist is required.
    async fn next_event(&mut self) -> Result<Option<GrantEvent>, FeedError>;
}

enum Signal {
    Event(GrantEvent),
    Disconnect(String),
}

#[derive(Default)]
struct FeedState {
    objects: BTreeMap<GrantKey, Grant>,
    version: u64,
    failing_lists: usize,
}

impl FeedState {
    fn bump(&mut self) -> ResourceVersion {
        self.version += 1;
        ResourceVersion(self.version)
    }
}

/// An in-process feed backed by an authoritative object map.
///
/// Changes are made through the paired [`MemoryFeedHandle`]. The handle
/// stamps every change with the next collection version, like an API
/// server would.
pub struct MemoryFeed {
    state: Arc<Mutex<FeedState>>,
    events: mpsc::UnboundedReceiver<Signal>,
}

/// Writer side of a [`MemoryFeed`].
///
/// Dropping every handle closes the feed.
#[derive(Clone)]
pub struct MemoryFeedHandle {
    state: Arc<Mutex<FeedState>>,
    sender: mpsc::UnboundedSender<Signal>,
}

impl MemoryFeed {
    /// Create an empty feed and its handle.
    pub fn channel() -> (Self, MemoryFeedHandle) {
        let state = Arc::new(Mutex::new(FeedState::default()));
        let (sender, events) = mpsc::unbounded_channel();
        let feed = Self {
            state: Arc::clone(&state),
            events,
        };
        (feed, MemoryFeedHandle { state, sender })
    }
}

#[async_trait]
impl GrantFeed for MemoryFeed {
    async fn list(&mut self) -> Result<GrantListing, FeedError> {
        let mut state = self.state.lock();
        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(FeedError::ListFailed("injected list failure".to_string()));
        }

        // Everything queued so far is already reflected in the listing.
        while self.events.try_recv().is_ok() {}

        Ok(GrantListing::new(
            ResourceVersion(state.version),
            state.objects.values().cloned().collect(),
        ))
    }

    async fn next_event(&mut self) -> Result<Option<GrantEvent>, FeedError> {
        match self.events.recv().await {
            Some(Signal::Event(event)) => Ok(Some(event)),
            Some(Signal::Disconnect(reason)) => Err(FeedError::Disconnected(reason)),
            None => Ok(None),
        }
    }
}

impl MemoryFeedHandle {
    /// Create or update a grant and emit the matching event.
    ///
    /// # Returns
    ///
    /// The version the grant was stamped with.
    pub fn publish(&self, grant: Grant) -> ResourceVersion {
        self.write(grant, true)
    }

    /// Create or update a grant without emitting an event, as if the event
    /// was lost.
    pub fn publish_silently(&self, grant: Grant) -> ResourceVersion {
        self.write(grant, false)
    }

    /// Delete a grant and emit the matching event.
    ///
    /// # Returns
    ///
    /// The deletion version, or `None` if the grant did not exist.
    pub fn remove(&self, key: &GrantKey) -> Option<ResourceVersion> {
        self.erase(key, true)
    }

    /// Delete a grant without emitting an event, as if the event was lost.
    pub fn remove_silently(&self, key: &GrantKey) -> Option<ResourceVersion> {
        self.erase(key, false)
    }

    /// Deliver an arbitrary event without changing the stored objects.
    ///
    /// Used to replay duplicates and out-of-order deliveries.
    pub fn inject(&self, event: GrantEvent) {
        let _ = self.sender.send(Signal::Event(event));
    }

    /// Break the watch. The consumer sees a [`FeedError::Disconnected`].
    pub fn disconnect(&self, reason: impl Into<String>) {
        let _ = self.sender.send(Signal::Disconnect(reason.into()));
    }

    /// Make the next `count` listings fail.
    pub fn fail_lists(&self, count: usize) {
        self.state.lock().failing_lists = count;
    }

    /// Current collection version.
    pub fn version(&self) -> ResourceVersion {
        ResourceVersion(self.state.lock().version)
    }

    /// The stored grant for a key.
    pub fn get(&self, key: &GrantKey) -> Option<Grant> {
        self.state.lock().objects.get(key).cloned()
    }

    fn write(&self, grant: Grant, emit: bool) -> ResourceVersion {
        let mut state = self.state.lock();
        let version = state.bump();
        let grant = grant.with_version(version);
        let key = grant.key().clone();

        let existed = state.objects.insert(key, grant.clone()).is_some();
        if emit {
            let event = if existed {
                GrantEvent::Modified(grant)
            } else {
                GrantEvent::Added(grant)
            };
            let _ = self.sender.send(Signal::Event(event));
        }
        version
    }

    fn erase(&self, key: &GrantKey, emit: bool) -> Option<ResourceVersion> {
        let mut state = self.state.lock();
        state.objects.remove(key)?;
        let version = state.bump();
        if emit {
            let _ = self.sender.send(Signal::Event(GrantEvent::Deleted {
                key: key.clone(),
                version,
            }));
        }
        Some(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refgrant_core::{EventKind, FromEntry, ToEntry};

    fn grant(name: &str) -> Grant {
        Grant::new("b", name, ResourceVersion::ZERO)
            .with_from(FromEntry::new("a", "", "Secret"))
            .with_to(ToEntry::new("", "Secret"))
    }

    #[tokio::test]
    async fn test_publish_emits_added_then_modified() {
        let (mut feed, handle) = MemoryFeed::channel();

        assert_eq!(handle.publish(grant("g")), ResourceVersion(1));
        assert_eq!(handle.publish(grant("g")), ResourceVersion(2));

        let first = feed.next_event().await.unwrap().unwrap();
        assert_eq!(first.kind(), EventKind::Added);
        assert_eq!(first.version(), ResourceVersion(1));

        let second = feed.next_event().await.unwrap().unwrap();
        assert_eq!(second.kind(), EventKind::Modified);
        assert_eq!(second.version(), ResourceVersion(2));
    }

    #[tokio::test]
    async fn test_list_reflects_silent_changes() {
        let (mut feed, handle) = MemoryFeed::channel();
        handle.publish(grant("g1"));
        handle.publish_silently(grant("g2"));
        handle.remove_silently(&GrantKey::new("b", "g1"));

        let listing = feed.list().await.unwrap();
        assert_eq!(listing.version, ResourceVersion(3));
        assert_eq!(listing.grants.len(), 1);
        assert_eq!(listing.grants[0].name(), "g2");

        // The queued event for g1 predates the listing.
        handle.disconnect("test");
        assert!(matches!(
            feed.next_event().await,
            Err(FeedError::Disconnected(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_missing_key() {
        let (_feed, handle) = MemoryFeed::channel();
        assert_eq!(handle.remove(&GrantKey::new("b", "nope")), None);
        assert_eq!(handle.version(), ResourceVersion::ZERO);
    }

    #[tokio::test]
    async fn test_injected_list_failures() {
        let (mut feed, handle) = MemoryFeed::channel();
        handle.fail_lists(1);

        assert!(matches!(feed.list().await, Err(FeedError::ListFailed(_))));
        assert!(feed.list().await.is_ok());
    }

    #[tokio::test]
    async fn test_dropping_handles_closes_feed() {
        let (mut feed, handle) = MemoryFeed::channel();
        drop(handle);
        assert_eq!(feed.next_event().await, Ok(None));
    }
}
