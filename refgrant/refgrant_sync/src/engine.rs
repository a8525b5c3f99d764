//! The assembled engine.

use std::sync::Arc;

use refgrant_core::{EngineConfig, ReferenceTriple, Result};
use refgrant_observability::{logging, ObservabilityError, SyncMetrics, SyncStatus};
use refgrant_policy::{Evaluation, GrantEvaluator, GrantIndex, Verdict};

use crate::feed::GrantFeed;
use crate::watcher::{GrantWatcher, WatcherHandle};

/// A grant index, its sync status and an evaluator over them, built from
/// one configuration.
pub struct ReferenceGrantEngine {
    config: EngineConfig,
    index: Arc<GrantIndex>,
    status: SyncStatus,
    evaluator: GrantEvaluator,
}

impl ReferenceGrantEngine {
    /// Create an engine with an empty, unsynced index.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let index = Arc::new(GrantIndex::with_config(&config.index));
        let status = SyncStatus::new();
        let evaluator = GrantEvaluator::new(Arc::clone(&index), status.clone());

        Ok(Self {
            config,
            index,
            status,
            evaluator,
        })
    }

    /// Install the process-wide log subscriber described by the
    /// configuration.
    ///
    /// Embedding applications that install their own subscriber skip this.
    /// Fails if a subscriber is already installed.
    pub fn init_logging(&self) -> std::result::Result<(), ObservabilityError> {
        logging::init(&self.config.logging)
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The grant index.
    pub fn index(&self) -> &Arc<GrantIndex> {
        &self.index
    }

    /// Sync state of the index.
    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// An evaluator over the index. Clones are cheap.
    pub fn evaluator(&self) -> &GrantEvaluator {
        &self.evaluator
    }

    /// Decide whether `from` may reference `to`.
    pub fn allowed(&self, from: &ReferenceTriple, to: &ReferenceTriple) -> Verdict {
        self.evaluator.allowed(from, to)
    }

    /// Decide whether `from` may reference `to`, with diagnostics.
    pub fn evaluate(&self, from: &ReferenceTriple, to: &ReferenceTriple) -> Evaluation {
        self.evaluator.evaluate(from, to)
    }

    /// Counters describing how the index was kept in sync.
    pub fn metrics(&self) -> SyncMetrics {
        self.status.metrics()
    }

    /// Start keeping the index in sync with `feed`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch<F>(&self, feed: F) -> WatcherHandle
    where
        F: GrantFeed + 'static,
    {
        GrantWatcher::start(
            feed,
            Arc::clone(&self.index),
            self.status.clone(),
            &self.config.watcher,
        )
    }
}
