//! List/watch driver.
//!
//! A [`GrantWatcher`] owns a feed and a reconciler and runs as one tokio
//! task: it lists, then applies events until the feed breaks, then backs
//! off and lists again. The task runs until [`WatcherHandle::stop`] is
//! called or the feed closes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use refgrant_core::WatcherConfig;
use refgrant_observability::SyncStatus;
use refgrant_policy::{GrantIndex, GrantStore};

use crate::feed::GrantFeed;
use crate::reconciler::Reconciler;

/// Why the watch task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// A stop was requested.
    Stopped,

    /// The feed closed.
    FeedClosed,

    /// The task panicked or was cancelled.
    Aborted,
}

/// Exponential relist backoff.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub(crate) fn new(config: &WatcherConfig) -> Self {
        Self {
            initial: config.initial_backoff(),
            max: config.max_backoff(),
            next: config.initial_backoff(),
        }
    }

    /// The delay to wait now; doubles the following one up to the ceiling.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// Keeps a grant store synchronized with a feed.
pub struct GrantWatcher<F, S = GrantIndex> {
    feed: F,
    reconciler: Reconciler<S>,
    backoff: Backoff,
    shutdown: oneshot::Receiver<()>,
}

impl<F, S> GrantWatcher<F, S>
where
    F: GrantFeed + 'static,
    S: GrantStore + 'static,
{
    /// Start watching `feed` into `store` on the current tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `feed` - The list/watch source.
    /// * `store` - The store to maintain. The watcher becomes its only
    ///   writer.
    /// * `status` - Sync state shared with evaluators of `store`.
    /// * `config` - Backoff and teardown settings.
    ///
    /// # Returns
    ///
    /// A handle that stops the task and releases the store.
    pub fn start(
        feed: F,
        store: Arc<S>,
        status: SyncStatus,
        config: &WatcherConfig,
    ) -> WatcherHandle<S> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let watcher = Self {
            feed,
            reconciler: Reconciler::new(Arc::clone(&store), status.clone())
                .with_tombstone_limit(config.max_tombstones),
            backoff: Backoff::new(config),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(watcher.run());

        WatcherHandle {
            shutdown: Some(shutdown_tx),
            task,
            store,
            status,
            clear_index_on_stop: config.clear_index_on_stop,
        }
    }

    async fn run(mut self) -> WatchExit {
        info!("grant watcher started");
        let mut needs_list = true;

        loop {
            if needs_list {
                let listed = tokio::select! {
                    _ = &mut self.shutdown => return WatchExit::Stopped,
                    listed = self.feed.list() => listed,
                };
                match listed {
                    Ok(listing) => {
                        self.reconciler.resync(listing);
                        self.backoff.reset();
                        needs_list = false;
                    }
                    Err(error) => {
                        warn!(error = %error, "grant listing failed");
                        self.reconciler.begin_resync(&error.to_string());
                        if self.pause().await {
                            return WatchExit::Stopped;
                        }
                        continue;
                    }
                }
            }

            let next = tokio::select! {
                _ = &mut self.shutdown => return WatchExit::Stopped,
                next = self.feed.next_event() => next,
            };
            match next {
                Ok(Some(event)) => {
                    let key = event.key().clone();
                    let kind = event.kind();
                    let outcome = self.reconciler.apply(event);
                    debug!(grant = %key, %kind, ?outcome, "applied grant event");
                }
                Ok(None) => {
                    info!("grant feed closed");
                    self.reconciler.status().mark_stopped();
                    return WatchExit::FeedClosed;
                }
                Err(error) => {
                    warn!(error = %error, "grant watch disrupted; relisting");
                    self.reconciler.begin_resync(&error.to_string());
                    if self.pause().await {
                        return WatchExit::Stopped;
                    }
                    needs_list = true;
                }
            }
        }
    }

    /// Sleep for the next backoff delay. Returns true if a stop arrived
    /// meanwhile.
    async fn pause(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "backing off before relist");
        tokio::select! {
            _ = &mut self.shutdown => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

/// Controls a running [`GrantWatcher`].
///
/// Dropping the handle without calling [`WatcherHandle::stop`] also ends
/// the task, but leaves the store as it was.
pub struct WatcherHandle<S = GrantIndex> {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<WatchExit>,
    store: Arc<S>,
    status: SyncStatus,
    clear_index_on_stop: bool,
}

impl<S> WatcherHandle<S>
where
    S: GrantStore,
{
    /// Sync state of the watched store.
    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// The watched store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Whether the task has already ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task and release the store.
    ///
    /// Once this returns, nothing writes to the store any more. If the
    /// watcher was configured to clear the index on stop, every grant has
    /// been removed and all later decisions are denied.
    pub async fn stop(mut self) -> WatchExit {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        let exit = match (&mut self.task).await {
            Ok(exit) => exit,
            Err(error) => {
                warn!(error = %error, "grant watcher task failed");
                WatchExit::Aborted
            }
        };

        if self.clear_index_on_stop {
            self.store.clear();
        }
        self.status.mark_stopped();
        info!(?exit, "grant watcher stopped");
        exit
    }
}
