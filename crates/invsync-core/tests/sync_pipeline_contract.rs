//! Pipeline contract: fetch → persist → publish per resource type
//!
//! Verifies ordering, fail-fast on fetch, and best-effort persist/publish.

mod common;

use common::*;
use invsync_core::traits::NotificationMessage;
use invsync_core::{
    ErrorCategory, ResourceKind, SnapshotStore, SyncOutcome, SyncRequest, SyncStage,
};
use serde_json::Value;

fn request(tenant: &str, account: &str) -> SyncRequest {
    SyncRequest {
        tenant_id: tenant.to_string(),
        account_id: account.to_string(),
        bundle: bundle(tenant, account),
    }
}

fn resources_body(message: &NotificationMessage) -> Value {
    match message {
        NotificationMessage::Resources(envelope) => serde_json::to_value(envelope).unwrap(),
        NotificationMessage::Failure(reason) => panic!("unexpected failure message: {}", reason),
    }
}

#[tokio::test]
async fn test_successful_run_persists_and_publishes_every_type() {
    let provider = MockCloudProvider::new(Inventory::sample());
    let provider_view = MockCloudProvider::sharing_counters_with(&provider);
    let store = RecordingStore::new();
    let channel = RecordingChannel::new();
    let worker = worker(provider, store.clone(), channel.clone());

    let report = worker.run(request("tenant-a", "prod")).await;

    assert_eq!(report.outcome, SyncOutcome::Completed);
    assert_eq!(provider_view.authenticate_call_count(), 1);
    assert_eq!(provider_view.list_calls(), ResourceKind::SYNC_ORDER.to_vec());

    let upserts = store.upserts();
    let keys: Vec<&str> = upserts.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["Network", "VM", "SecurityGroup", "NetworkInterface"]);

    let deliveries = channel.deliveries();
    assert_eq!(deliveries.len(), 4);
    assert_eq!(channel.failure_count(), 0);

    for (entity, delivery) in upserts.iter().zip(deliveries.iter()) {
        assert_eq!(entity.namespace, "tenant-a");
        assert_eq!(entity.kind, "AZURE_Resources");
        assert_eq!(entity.account_id, "prod");
        assert_eq!(entity.resource_type, entity.key);

        let body = resources_body(&delivery.message);
        assert_eq!(body["dataType"], "resources");
        assert_eq!(body["sourceSystemType"], "azure");
        assert_eq!(body["sourceSystemProjectId"], "app-123");
        assert_eq!(body["data"][0]["resourceType"], entity.key.as_str());
        assert_eq!(body["data"][0]["lastUpdated"], entity.last_updated_text());

        let persisted: Value = serde_json::from_str(&entity.resource_data).unwrap();
        assert_eq!(body["data"][0]["resourceData"], persisted);

        assert_eq!(delivery.correlation, report.correlation);
    }
}

#[tokio::test]
async fn test_each_snapshot_is_stored_before_it_is_announced() {
    let events = EventLog::new();
    let worker = worker(
        MockCloudProvider::new(Inventory::sample()),
        RecordingStore::new().with_events(&events),
        RecordingChannel::new().with_events(&events),
    );

    worker.run(request("tenant-a", "prod")).await;

    let expected: Vec<Event> = ResourceKind::SYNC_ORDER
        .iter()
        .flat_map(|kind| {
            [
                Event::Upsert(kind.key().to_string()),
                Event::Publish(kind.key().to_string()),
            ]
        })
        .collect();
    assert_eq!(events.events(), expected);
}

#[tokio::test]
async fn test_failed_store_write_still_precedes_the_announcement() {
    let events = EventLog::new();
    let worker = worker(
        MockCloudProvider::new(Inventory::sample()),
        RecordingStore::failing().with_events(&events),
        RecordingChannel::new().with_events(&events),
    );

    let report = worker.run(request("tenant-a", "prod")).await;
    assert_eq!(report.persist_failures, 4);

    for kind in ResourceKind::SYNC_ORDER {
        let upsert = events
            .position(&Event::Upsert(kind.key().to_string()))
            .unwrap_or_else(|| panic!("no upsert attempt for {}", kind));
        let publish = events
            .position(&Event::Publish(kind.key().to_string()))
            .unwrap_or_else(|| panic!("no notification for {}", kind));
        assert!(upsert < publish, "{} announced before its write", kind);
    }
}

#[tokio::test]
async fn test_failure_notification_follows_earlier_snapshots() {
    let events = EventLog::new();
    let worker = worker(
        MockCloudProvider::new(Inventory::sample()).failing_on(ResourceKind::SecurityGroup),
        RecordingStore::new().with_events(&events),
        RecordingChannel::new().with_events(&events),
    );

    worker.run(request("tenant-a", "prod")).await;

    assert_eq!(
        events.events(),
        vec![
            Event::Upsert("Network".into()),
            Event::Publish("Network".into()),
            Event::Upsert("VM".into()),
            Event::Publish("VM".into()),
            Event::PublishFailure,
        ]
    );
}

#[tokio::test]
async fn test_pipeline_publishes_all_security_groups() {
    let store = RecordingStore::new();
    let worker = worker(
        MockCloudProvider::new(Inventory::sample()),
        store.clone(),
        RecordingChannel::new(),
    );

    worker.run(request("tenant-a", "prod")).await;

    let groups = store
        .get("tenant-a", "AZURE_Resources", "SecurityGroup")
        .await
        .unwrap()
        .unwrap();
    let groups: Value = serde_json::from_str(&groups.resource_data).unwrap();
    let names: Vec<&str> = groups
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["managed", "unmanaged"]);
}

#[tokio::test]
async fn test_vm_fetch_failure_stops_the_run() {
    let provider = MockCloudProvider::new(Inventory::sample()).failing_on(ResourceKind::VirtualMachine);
    let provider_view = MockCloudProvider::sharing_counters_with(&provider);
    let store = RecordingStore::new();
    let channel = RecordingChannel::new();
    let worker = worker(provider, store.clone(), channel.clone());

    let report = worker.run(request("tenant-a", "prod")).await;

    assert_eq!(
        provider_view.list_calls(),
        vec![ResourceKind::Network, ResourceKind::VirtualMachine]
    );

    let upserts = store.upserts();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].key, "Network");

    let deliveries = channel.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert!(!deliveries[0].message.is_failure());
    assert_eq!(
        deliveries[1].message,
        NotificationMessage::Failure(
            "Error retrieving VMs from Azure - stopping any further processing".to_string()
        )
    );

    match report.outcome {
        SyncOutcome::Failed {
            stage, category, ..
        } => {
            assert_eq!(stage, SyncStage::Fetch(ResourceKind::VirtualMachine));
            assert_eq!(category, ErrorCategory::Fetch);
        }
        other => panic!("expected failure, got {:?}", other),
    }

    // The Network snapshot written before the failure stays in place
    assert!(store
        .get("tenant-a", "AZURE_Resources", "Network")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_failure_at_each_step_publishes_exactly_one_failure() {
    for (index, kind) in ResourceKind::SYNC_ORDER.into_iter().enumerate() {
        let store = RecordingStore::new();
        let channel = RecordingChannel::new();
        let worker = worker(
            MockCloudProvider::new(Inventory::sample()).failing_on(kind),
            store.clone(),
            channel.clone(),
        );

        let report = worker.run(request("tenant-a", "prod")).await;

        assert_eq!(store.upsert_count(), index, "upserts before {}", kind);
        assert_eq!(channel.success_count(), index, "notifications before {}", kind);
        assert_eq!(channel.failure_count(), 1, "failure notifications for {}", kind);
        assert!(!report.is_success());
    }
}

#[tokio::test]
async fn test_authentication_failure_fetches_nothing() {
    let provider = MockCloudProvider::new(Inventory::sample()).failing_authentication();
    let provider_view = MockCloudProvider::sharing_counters_with(&provider);
    let store = RecordingStore::new();
    let channel = RecordingChannel::new();
    let worker = worker(provider, store.clone(), channel.clone());

    let report = worker.run(request("tenant-a", "prod")).await;

    assert_eq!(provider_view.authenticate_call_count(), 1);
    assert!(provider_view.list_calls().is_empty());
    assert_eq!(store.upsert_count(), 0);
    assert_eq!(
        channel.deliveries().into_iter().map(|d| d.message).collect::<Vec<_>>(),
        vec![NotificationMessage::Failure(
            "Won't be able to retrieve any data from Azure since no authentication/authorization/connection could be established"
                .to_string()
        )]
    );
    assert!(matches!(
        report.outcome,
        SyncOutcome::Failed {
            stage: SyncStage::Authenticate,
            category: ErrorCategory::Authentication,
            ..
        }
    ));
}

#[tokio::test]
async fn test_incomplete_bundle_never_reaches_the_provider() {
    let provider = MockCloudProvider::new(Inventory::sample());
    let provider_view = MockCloudProvider::sharing_counters_with(&provider);
    let channel = RecordingChannel::new();
    let worker = worker(provider, RecordingStore::new(), channel.clone());

    let mut req = request("tenant-a", "prod");
    req.bundle.provider_tenant_id.clear();
    let report = worker.run(req).await;

    assert_eq!(provider_view.authenticate_call_count(), 0);
    assert_eq!(channel.failure_count(), 1);
    assert!(matches!(
        report.outcome,
        SyncOutcome::Failed {
            stage: SyncStage::Authenticate,
            category: ErrorCategory::Credential,
            ..
        }
    ));
}

#[tokio::test]
async fn test_empty_collections_are_still_persisted_and_published() {
    let store = RecordingStore::new();
    let channel = RecordingChannel::new();
    let worker = worker(
        MockCloudProvider::new(Inventory::default()),
        store.clone(),
        channel.clone(),
    );

    let report = worker.run(request("tenant-a", "prod")).await;
    assert!(report.is_success());

    for entity in store.upserts() {
        assert_eq!(entity.resource_data, "[]");
    }
    assert_eq!(store.upsert_count(), 4);

    for delivery in channel.deliveries() {
        let body = resources_body(&delivery.message);
        assert_eq!(body["data"][0]["resourceData"], serde_json::json!([]));
    }
    assert_eq!(channel.success_count(), 4);
}

#[tokio::test]
async fn test_persist_failures_do_not_stop_the_run() {
    let channel = RecordingChannel::new();
    let worker = worker(
        MockCloudProvider::new(Inventory::sample()),
        RecordingStore::failing(),
        channel.clone(),
    );

    let report = worker.run(request("tenant-a", "prod")).await;

    assert!(report.is_success());
    assert_eq!(report.persist_failures, 4);
    assert!(report.persisted.is_empty());
    assert_eq!(channel.success_count(), 4);
}

#[tokio::test]
async fn test_publish_failures_do_not_stop_the_run() {
    let store = RecordingStore::new();
    let worker = worker(
        MockCloudProvider::new(Inventory::sample()),
        store.clone(),
        RecordingChannel::failing(),
    );

    let report = worker.run(request("tenant-a", "prod")).await;

    assert!(report.is_success());
    assert_eq!(report.publish_failures, 4);
    assert_eq!(report.persisted, ResourceKind::SYNC_ORDER.to_vec());
    assert_eq!(store.upsert_count(), 4);
}

#[tokio::test]
async fn test_session_is_released_after_every_run() {
    let worker = worker(
        MockCloudProvider::new(Inventory::sample()).failing_on(ResourceKind::SecurityGroup),
        RecordingStore::new(),
        RecordingChannel::new(),
    );

    worker.run(request("tenant-a", "prod")).await;
    assert!(worker.sessions().is_empty().await);
}
