//! Integration tests for the list/watch driver.
//!
//! These tests run a watcher against an in-memory feed and check what
//! evaluators observe while grants are published, revoked, missed during an
//! outage, and released on stop.

use std::sync::Arc;
use std::time::Duration;

use refgrant_core::api::SchemaRegistry;
use refgrant_core::{
    EngineConfig, FromEntry, Grant, GrantEvent, GrantKey, ReferenceTriple, ResourceVersion,
    ToEntry,
};
use refgrant_observability::{SyncState, SyncStatus};
use refgrant_policy::{GrantEvaluator, GrantIndex, GrantStore, Verdict};
use refgrant_sync::{GrantWatcher, MemoryFeed, ReferenceGrantEngine, WatchExit};
use serde_json::json;

async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

fn engine() -> ReferenceGrantEngine {
    ReferenceGrantEngine::new(EngineConfig::minimal_for_testing()).unwrap()
}

fn secret_grant(name: &str, from_namespace: &str) -> Grant {
    Grant::new("b", name, ResourceVersion::ZERO)
        .with_from(FromEntry::new(from_namespace, "", "Secret"))
        .with_to(ToEntry::new("", "Secret"))
}

fn secret(namespace: &str) -> ReferenceTriple {
    ReferenceTriple::named(namespace, "", "Secret", "s1")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initial_listing_makes_decisions_authoritative() {
    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    handle.publish(secret_grant("g1", "a"));

    assert!(engine.evaluate(&secret("a"), &secret("b")).provisional);

    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;

    let evaluation = engine.evaluate(&secret("a"), &secret("b"));
    assert_eq!(evaluation.verdict, Verdict::Allowed);
    assert!(!evaluation.provisional);

    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_events_grant_and_revoke() {
    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;

    assert_eq!(engine.allowed(&secret("a"), &secret("b")), Verdict::Denied);

    handle.publish(secret_grant("g1", "a"));
    eventually("grant applied", || {
        engine.allowed(&secret("a"), &secret("b")).is_allowed()
    })
    .await;

    handle.remove(&GrantKey::new("b", "g1"));
    eventually("grant revoked", || {
        !engine.allowed(&secret("a"), &secret("b")).is_allowed()
    })
    .await;

    let metrics = engine.metrics();
    assert_eq!(metrics.events_applied, 2);
    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_relist_revokes_deletion_missed_during_outage() {
    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    handle.publish(secret_grant("g1", "a"));

    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;
    assert!(engine.allowed(&secret("a"), &secret("b")).is_allowed());

    handle.remove_silently(&GrantKey::new("b", "g1"));
    handle.publish_silently(secret_grant("g2", "c"));
    handle.disconnect("connection reset");

    eventually("relist", || {
        let metrics = engine.metrics();
        metrics.resyncs == 2 && metrics.state == SyncState::Synced
    })
    .await;

    assert_eq!(engine.allowed(&secret("a"), &secret("b")), Verdict::Denied);
    assert_eq!(engine.allowed(&secret("c"), &secret("b")), Verdict::Allowed);
    assert_eq!(engine.metrics().revoked_by_resync, 1);

    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_last_known_index_is_served_provisionally_while_relisting() {
    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    handle.publish(secret_grant("g1", "a"));

    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;

    handle.fail_lists(usize::MAX);
    handle.disconnect("connection reset");
    eventually("resyncing", || engine.status().state() == SyncState::Resyncing).await;

    let evaluation = engine.evaluate(&secret("a"), &secret("b"));
    assert!(evaluation.is_allowed());
    assert!(evaluation.provisional);

    handle.fail_lists(0);
    eventually("recovered", || engine.status().is_authoritative()).await;

    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initial_list_failures_are_retried() {
    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    handle.publish(secret_grant("g1", "a"));
    handle.fail_lists(3);

    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;

    assert!(engine.allowed(&secret("a"), &secret("b")).is_allowed());
    assert_eq!(engine.metrics().resyncs, 1);
    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_delivery_is_discarded() {
    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;

    let key = GrantKey::new("b", "g1");
    handle.publish(secret_grant("g1", "a"));
    let current = handle.publish(secret_grant("g1", "c"));
    eventually("update applied", || {
        engine.index().version_of(&key) == Some(current)
    })
    .await;

    handle.inject(GrantEvent::Modified(
        secret_grant("g1", "a").with_version(ResourceVersion(1)),
    ));
    eventually("stale event seen", || engine.metrics().events_stale == 1).await;

    assert_eq!(engine.index().version_of(&key), Some(current));
    assert_eq!(engine.allowed(&secret("a"), &secret("b")), Verdict::Denied);
    assert_eq!(engine.allowed(&secret("c"), &secret("b")), Verdict::Allowed);

    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_releases_the_index() {
    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    handle.publish(secret_grant("g1", "a"));

    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;

    assert_eq!(watcher.stop().await, WatchExit::Stopped);
    assert!(engine.index().is_empty());
    assert_eq!(engine.status().state(), SyncState::Stopped);
    assert_eq!(engine.allowed(&secret("a"), &secret("b")), Verdict::Denied);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_can_keep_the_index() {
    let mut config = EngineConfig::minimal_for_testing();
    config.watcher.clear_index_on_stop = false;

    let index = Arc::new(GrantIndex::with_config(&config.index));
    let status = SyncStatus::new();
    let evaluator = GrantEvaluator::new(Arc::clone(&index), status.clone());

    let (feed, handle) = MemoryFeed::channel();
    handle.publish(secret_grant("g1", "a"));
    let watcher = GrantWatcher::start(feed, Arc::clone(&index), status.clone(), &config.watcher);
    eventually("initial sync", || status.is_authoritative()).await;

    watcher.stop().await;
    assert_eq!(index.len(), 1);

    let evaluation = evaluator.evaluate(&secret("a"), &secret("b"));
    assert!(evaluation.is_allowed());
    assert!(evaluation.provisional);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_closed_feed_ends_the_watcher() {
    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;

    drop(handle);
    eventually("task exit", || watcher.is_finished()).await;

    assert_eq!(watcher.stop().await, WatchExit::FeedClosed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wire_grants_flow_through_the_watcher() {
    let registry = SchemaRegistry::builtin().unwrap();
    let grant = registry
        .decode_object(json!({
            "apiVersion": "gateway.networking.k8s.io/v1alpha2",
            "kind": "ReferenceGrant",
            "metadata": {"namespace": "b", "name": "routes", "resourceVersion": "1"},
            "spec": {
                "from": [{
                    "group": "gateway.networking.k8s.io",
                    "kind": "HTTPRoute",
                    "namespace": "a"
                }],
                "to": [{"group": "", "kind": "Service", "name": "web"}]
            }
        }))
        .unwrap();

    let engine = engine();
    let (feed, handle) = MemoryFeed::channel();
    let watcher = engine.watch(feed);
    eventually("initial sync", || engine.status().is_authoritative()).await;

    handle.publish(grant);
    let route = ReferenceTriple::new("a", "gateway.networking.k8s.io", "HTTPRoute");
    eventually("grant applied", || {
        engine
            .allowed(&route, &ReferenceTriple::named("b", "", "Service", "web"))
            .is_allowed()
    })
    .await;
    assert_eq!(
        engine.allowed(&route, &ReferenceTriple::named("b", "", "Service", "db")),
        Verdict::Denied
    );

    watcher.stop().await;
}
