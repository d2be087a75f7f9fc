//! Dispatcher contract: `run_sync` never blocks the caller, runs are
//! bounded, and every scheduled run is eventually collected.

mod common;

use common::*;
use invsync_core::{SyncDispatcher, SyncWorker};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::assert_ok;

fn slow_worker(store: RecordingStore, channel: RecordingChannel) -> Arc<SyncWorker> {
    Arc::new(worker(
        MockCloudProvider::new(Inventory::sample()).with_list_delay(Duration::from_millis(50)),
        store,
        channel,
    ))
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() {
    let worker = slow_worker(RecordingStore::new(), RecordingChannel::new());
    assert!(SyncDispatcher::new(worker, 0).is_err());
}

#[test]
fn test_dispatcher_needs_a_runtime() {
    let worker = slow_worker(RecordingStore::new(), RecordingChannel::new());
    assert!(SyncDispatcher::new(worker, 1).is_err());
}

#[tokio::test]
async fn test_run_sync_returns_before_the_run_finishes() {
    let store = RecordingStore::new();
    let dispatcher =
        assert_ok!(SyncDispatcher::new(slow_worker(store.clone(), RecordingChannel::new()), 4));

    let started = Instant::now();
    dispatcher.run_sync("tenant-a", "prod", bundle("tenant-a", "prod"));
    assert!(started.elapsed() < Duration::from_millis(50));
    assert_eq!(dispatcher.in_flight(), 1);
    assert_eq!(store.upsert_count(), 0);

    let reports = dispatcher.drain().await;
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_success());
    assert_eq!(store.upsert_count(), 4);
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn test_many_accounts_run_independently() {
    let store = RecordingStore::new();
    let channel = RecordingChannel::new();
    let dispatcher =
        assert_ok!(SyncDispatcher::new(slow_worker(store.clone(), channel.clone()), 8));

    for tenant in ["tenant-a", "tenant-b", "tenant-c"] {
        dispatcher.run_sync(tenant, "prod", bundle(tenant, "prod"));
    }

    let reports = dispatcher.drain().await;
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.is_success()));
    assert_eq!(channel.success_count(), 12);

    let mut tenants: Vec<String> = reports
        .iter()
        .map(|r| r.correlation.tenant_id.clone())
        .collect();
    tenants.sort();
    assert_eq!(tenants, vec!["tenant-a", "tenant-b", "tenant-c"]);
}

#[tokio::test]
async fn test_concurrency_bound_is_respected() {
    let dispatcher = assert_ok!(SyncDispatcher::new(
        slow_worker(RecordingStore::new(), RecordingChannel::new()),
        1
    ));

    // Each run sleeps 50ms per listing; two runs behind a single permit
    // cannot finish before twice the single-run time.
    let started = Instant::now();
    dispatcher.run_sync("tenant-a", "prod", bundle("tenant-a", "prod"));
    dispatcher.run_sync("tenant-b", "prod", bundle("tenant-b", "prod"));

    let reports = dispatcher.drain().await;
    assert_eq!(reports.len(), 2);
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_failed_run_is_reported_not_propagated() {
    let channel = RecordingChannel::new();
    let worker = Arc::new(worker(
        MockCloudProvider::new(Inventory::sample()).failing_authentication(),
        RecordingStore::new(),
        channel.clone(),
    ));
    let dispatcher = assert_ok!(SyncDispatcher::new(worker, 2));

    dispatcher.run_sync("tenant-a", "prod", bundle("tenant-a", "prod"));
    let reports = dispatcher.drain().await;

    assert_eq!(reports.len(), 1);
    assert!(!reports[0].is_success());
    assert_eq!(channel.failure_count(), 1);
}
