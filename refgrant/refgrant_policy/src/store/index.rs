//! In-memory grant index.
//!
//! Grants are bucketed by owner namespace. Each bucket is copy-on-write:
//! readers clone an `Arc` to the current immutable map, writers build the
//! next map under a per-bucket writer lock and swap it in. A reader
//! therefore sees either the whole previous state or the whole new state of
//! a namespace, and never waits on a writer for longer than the swap.
//!
//! A bucket that empties is retired and dropped from the index. Retirement
//! happens under the bucket's writer lock, and a writer that finds its
//! bucket retired looks the namespace up again.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, warn};

use refgrant_core::{Grant, GrantKey, IndexConfig};

use super::snapshot::{GrantMap, GrantSnapshot};
use super::{GrantStore, UpsertOutcome};

/// One namespace worth of grants.
#[derive(Default)]
struct NamespaceBucket {
    /// Serializes writers so concurrent updates cannot lose each other.
    /// Holds `true` once the bucket has been retired.
    writer: Mutex<bool>,

    /// The published map. Only ever replaced, never mutated in place.
    current: RwLock<Arc<GrantMap>>,
}

impl NamespaceBucket {
    fn load(&self) -> Arc<GrantMap> {
        self.current.read().clone()
    }

    fn publish(&self, next: GrantMap) {
        *self.current.write() = Arc::new(next);
    }
}

/// A concurrent index of active grants, keyed by target namespace.
pub struct GrantIndex {
    /// Buckets by namespace. Only non-empty buckets stay registered.
    buckets: DashMap<String, Arc<NamespaceBucket>>,

    /// Maximum entries allowed in either list of a grant.
    max_entries_per_list: usize,
}

impl GrantIndex {
    /// Create an empty index with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&IndexConfig::default())
    }

    /// Create an empty index.
    pub fn with_config(config: &IndexConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            max_entries_per_list: config.max_entries_per_list,
        }
    }

    /// Namespaces that currently hold at least one grant, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self
            .buckets
            .iter()
            .filter(|entry| !entry.value().load().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        namespaces.sort();
        namespaces
    }

    fn bucket(&self, namespace: &str) -> Option<Arc<NamespaceBucket>> {
        self.buckets.get(namespace).map(|entry| entry.value().clone())
    }

    fn bucket_or_create(&self, namespace: &str) -> Arc<NamespaceBucket> {
        if let Some(bucket) = self.bucket(namespace) {
            return bucket;
        }
        self.buckets
            .entry(namespace.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Drop an emptied bucket. The caller holds its writer lock.
    fn retire(&self, namespace: &str, bucket: &Arc<NamespaceBucket>, retired: &mut bool) {
        *retired = true;
        self.buckets
            .remove_if(namespace, |_, registered| Arc::ptr_eq(registered, bucket));
    }
}

impl Default for GrantIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl GrantStore for GrantIndex {
    fn upsert(&self, grant: Grant) -> UpsertOutcome {
        if let Err(reason) = grant.validate(self.max_entries_per_list) {
            warn!(
                namespace = grant.namespace(),
                name = grant.name(),
                version = %grant.version(),
                error = %reason,
                "rejecting malformed grant"
            );
            return UpsertOutcome::Rejected(reason);
        }

        let name = grant.name().to_string();
        let version = grant.version();

        let previous = loop {
            let bucket = self.bucket_or_create(grant.namespace());
            let retired = bucket.writer.lock();
            if *retired {
                continue;
            }
            let mut next = (*bucket.load()).clone();
            let previous = next.insert(name.clone(), Arc::new(grant));
            bucket.publish(next);
            break previous;
        };

        match previous {
            Some(previous) => {
                debug!(
                    namespace = previous.namespace(),
                    name = %name,
                    from_version = %previous.version(),
                    to_version = %version,
                    "replaced grant"
                );
                UpsertOutcome::Replaced { previous }
            }
            None => {
                debug!(name = %name, version = %version, "inserted grant");
                UpsertOutcome::Inserted
            }
        }
    }

    fn delete(&self, namespace: &str, name: &str) -> Option<Arc<Grant>> {
        let bucket = self.bucket(namespace)?;

        let mut retired = bucket.writer.lock();
        if *retired {
            return None;
        }
        let current = bucket.load();
        if !current.contains_key(name) {
            return None;
        }
        let mut next = (*current).clone();
        let removed = next.remove(name);
        let emptied = next.is_empty();
        bucket.publish(next);
        if emptied {
            self.retire(namespace, &bucket, &mut retired);
        }

        debug!(namespace, name, "deleted grant");
        removed
    }

    fn snapshot(&self, namespace: &str) -> GrantSnapshot {
        match self.bucket(namespace) {
            Some(bucket) => GrantSnapshot::new(namespace, bucket.load()),
            None => GrantSnapshot::empty(namespace),
        }
    }

    fn keys(&self) -> Vec<GrantKey> {
        let buckets: Vec<(String, Arc<NamespaceBucket>)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut keys: Vec<GrantKey> = buckets
            .into_iter()
            .flat_map(|(namespace, bucket)| {
                GrantSnapshot::new(namespace, bucket.load())
                    .keys()
                    .collect::<Vec<_>>()
            })
            .collect();
        keys.sort();
        keys
    }

    fn clear(&self) {
        let buckets: Vec<(String, Arc<NamespaceBucket>)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (namespace, bucket) in buckets {
            let mut retired = bucket.writer.lock();
            if *retired {
                continue;
            }
            bucket.publish(GrantMap::new());
            self.retire(&namespace, &bucket, &mut retired);
        }
        debug!("cleared grant index");
    }

    fn len(&self) -> usize {
        self.buckets
            .iter()
            .map(|entry| entry.value().load().len())
            .sum()
    }
}
