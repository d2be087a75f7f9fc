//! Test doubles shared by the pipeline contract tests
//!
//! The doubles count calls and record what they were given; none of them
//! talk to a real cloud, store, or broker.

#![allow(dead_code)]

use async_trait::async_trait;
use invsync_core::error::{Error, Result};
use invsync_core::resources::{
    Network, NetworkInterface, SecurityGroup, Subnet, Tags, VirtualMachine,
};
use invsync_core::traits::{
    CloudProvider, CredentialBundle, Delivery, NotificationChannel, NotificationMessage,
    ProviderSession, SnapshotEntity, SnapshotStore,
};
use invsync_core::{MemorySnapshotStore, ResourceKind, SessionManager, SyncWorker, WorkerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn bundle(tenant_id: &str, account_id: &str) -> CredentialBundle {
    CredentialBundle {
        tenant_id: tenant_id.to_string(),
        account_id: account_id.to_string(),
        app_id: "app-123".to_string(),
        secret: "s3cr3t".to_string(),
        provider_tenant_id: "directory".to_string(),
        subscription_id: "subscription".to_string(),
    }
}

pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn security_group(name: &str, resource_group: &str, tags: Tags) -> SecurityGroup {
    SecurityGroup {
        id: format!(
            "/subscriptions/subscription/resourceGroups/{}/providers/Microsoft.Network/networkSecurityGroups/{}",
            resource_group, name
        ),
        name: name.to_string(),
        region_name: "westeurope".to_string(),
        resource_group_name: resource_group.to_string(),
        tags,
        ..Default::default()
    }
}

/// Inventory returned by [`MockCloudProvider`] sessions
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub networks: Vec<Network>,
    pub virtual_machines: Vec<VirtualMachine>,
    pub security_groups: Vec<SecurityGroup>,
    pub network_interfaces: Vec<NetworkInterface>,
}

impl Inventory {
    /// One resource of every type
    pub fn sample() -> Self {
        Self {
            networks: vec![Network {
                id: "vnet-1".into(),
                name: "vnet-1".into(),
                region_name: "westeurope".into(),
                resource_group_name: "rg".into(),
                address_prefixes: vec!["10.0.0.0/16".into()],
                subnets: vec![Subnet {
                    name: "default".into(),
                    address_prefix: Some("10.0.0.0/24".into()),
                    ..Default::default()
                }],
                tags: Tags::new(),
            }],
            virtual_machines: vec![VirtualMachine {
                id: "vm-1".into(),
                name: "vm-1".into(),
                power_state: Some("PowerState/running".into()),
                network_interface_ids: vec!["nic-1".into()],
                ..Default::default()
            }],
            security_groups: vec![
                security_group("managed", "rg", tags(&[("ExtremePolicyId", "1")])),
                security_group("unmanaged", "rg", Tags::new()),
            ],
            network_interfaces: vec![NetworkInterface {
                id: "nic-1".into(),
                name: "nic-1".into(),
                primary_private_ip: Some("10.0.0.4".into()),
                ..Default::default()
            }],
        }
    }
}

/// Cloud provider double with scripted failures and call counters
pub struct MockCloudProvider {
    pub inventory: Arc<Mutex<Inventory>>,
    pub fail_authentication: bool,
    pub fail_on: Option<ResourceKind>,
    pub list_delay: Option<Duration>,
    authenticate_calls: Arc<AtomicUsize>,
    list_calls: Arc<Mutex<Vec<ResourceKind>>>,
    assignments: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl MockCloudProvider {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory: Arc::new(Mutex::new(inventory)),
            fail_authentication: false,
            fail_on: None,
            list_delay: None,
            authenticate_calls: Arc::new(AtomicUsize::new(0)),
            list_calls: Arc::new(Mutex::new(Vec::new())),
            assignments: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_authentication(mut self) -> Self {
        self.fail_authentication = true;
        self
    }

    pub fn failing_on(mut self, kind: ResourceKind) -> Self {
        self.fail_on = Some(kind);
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// A provider that shares inventory and counters with `other`
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            inventory: Arc::clone(&other.inventory),
            fail_authentication: other.fail_authentication,
            fail_on: other.fail_on,
            list_delay: other.list_delay,
            authenticate_calls: Arc::clone(&other.authenticate_calls),
            list_calls: Arc::clone(&other.list_calls),
            assignments: Arc::clone(&other.assignments),
        }
    }

    pub fn authenticate_call_count(&self) -> usize {
        self.authenticate_calls.load(Ordering::SeqCst)
    }

    /// Listing calls in the order they were made
    pub fn list_calls(&self) -> Vec<ResourceKind> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn assignments(&self) -> Vec<(String, Option<String>)> {
        self.assignments.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudProvider for MockCloudProvider {
    async fn authenticate(&self, bundle: &CredentialBundle) -> Result<Arc<dyn ProviderSession>> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_authentication {
            return Err(Error::auth("invalid client secret"));
        }

        Ok(Arc::new(MockSession {
            subscription_id: bundle.subscription_id.clone(),
            inventory: Arc::clone(&self.inventory),
            fail_on: self.fail_on,
            list_delay: self.list_delay,
            list_calls: Arc::clone(&self.list_calls),
            assignments: Arc::clone(&self.assignments),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn display_name(&self) -> &'static str {
        "Azure"
    }
}

struct MockSession {
    subscription_id: String,
    inventory: Arc<Mutex<Inventory>>,
    fail_on: Option<ResourceKind>,
    list_delay: Option<Duration>,
    list_calls: Arc<Mutex<Vec<ResourceKind>>>,
    assignments: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl MockSession {
    async fn record(&self, kind: ResourceKind) -> Result<Inventory> {
        self.list_calls.lock().unwrap().push(kind);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on == Some(kind) {
            return Err(Error::fetch(kind.display_name(), "HTTP 500"));
        }
        Ok(self.inventory.lock().unwrap().clone())
    }
}

#[async_trait]
impl ProviderSession for MockSession {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        Ok(self.record(ResourceKind::Network).await?.networks)
    }

    async fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>> {
        Ok(self.record(ResourceKind::VirtualMachine).await?.virtual_machines)
    }

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        Ok(self.record(ResourceKind::SecurityGroup).await?.security_groups)
    }

    async fn list_network_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        Ok(self.record(ResourceKind::NetworkInterface).await?.network_interfaces)
    }

    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup> {
        self.inventory
            .lock()
            .unwrap()
            .security_groups
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(id))
    }

    async fn set_network_interface_security_group(
        &self,
        network_interface_id: &str,
        security_group_id: Option<&str>,
    ) -> Result<()> {
        let known = self
            .inventory
            .lock()
            .unwrap()
            .network_interfaces
            .iter()
            .any(|n| n.id == network_interface_id);
        if !known {
            return Err(Error::not_found(network_interface_id));
        }
        self.assignments.lock().unwrap().push((
            network_interface_id.to_string(),
            security_group_id.map(str::to_string),
        ));
        Ok(())
    }
}

/// Store and channel calls as seen from outside the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Upsert attempt for a snapshot key
    Upsert(String),
    /// Success notification for a resource type
    Publish(String),
    /// Plain-text failure notification
    PublishFailure,
}

/// Ordered log shared between a [`RecordingStore`] and a [`RecordingChannel`]
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Position of the first occurrence of `event`
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Snapshot store double that records upserts and can be told to fail
#[derive(Clone)]
pub struct RecordingStore {
    pub inner: MemorySnapshotStore,
    pub fail_upserts: bool,
    upserts: Arc<Mutex<Vec<SnapshotEntity>>>,
    events: EventLog,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemorySnapshotStore::new(),
            fail_upserts: false,
            upserts: Arc::new(Mutex::new(Vec::new())),
            events: EventLog::new(),
        }
    }

    /// Record upserts into `events` as well
    pub fn with_events(mut self, events: &EventLog) -> Self {
        self.events = events.clone();
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_upserts: true,
            ..Self::new()
        }
    }

    pub fn upserts(&self) -> Vec<SnapshotEntity> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }
}

#[async_trait]
impl SnapshotStore for RecordingStore {
    async fn upsert(&self, entity: &SnapshotEntity) -> Result<()> {
        self.upserts.lock().unwrap().push(entity.clone());
        self.events.push(Event::Upsert(entity.key.clone()));
        if self.fail_upserts {
            return Err(Error::persist("datastore unavailable"));
        }
        self.inner.upsert(entity).await
    }

    async fn get(&self, namespace: &str, kind: &str, key: &str) -> Result<Option<SnapshotEntity>> {
        self.inner.get(namespace, kind, key).await
    }

    async fn list(&self, namespace: &str, kind: &str) -> Result<Vec<SnapshotEntity>> {
        self.inner.list(namespace, kind).await
    }

    async fn delete(&self, namespace: &str, kind: &str, key: &str) -> Result<()> {
        self.inner.delete(namespace, kind, key).await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Notification channel double that records every publish attempt
#[derive(Clone)]
pub struct RecordingChannel {
    pub fail_publishes: bool,
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    events: EventLog,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            fail_publishes: false,
            deliveries: Arc::new(Mutex::new(Vec::new())),
            events: EventLog::new(),
        }
    }

    /// Record publishes into `events` as well
    pub fn with_events(mut self, events: &EventLog) -> Self {
        self.events = events.clone();
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_publishes: true,
            ..Self::new()
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn failure_count(&self) -> usize {
        self.deliveries()
            .iter()
            .filter(|d| d.message.is_failure())
            .count()
    }

    pub fn success_count(&self) -> usize {
        self.deliveries()
            .iter()
            .filter(|d| !d.message.is_failure())
            .count()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn publish(&self, delivery: &Delivery) -> Result<()> {
        self.deliveries.lock().unwrap().push(delivery.clone());
        self.events.push(match &delivery.message {
            NotificationMessage::Resources(envelope) => Event::Publish(
                envelope
                    .data
                    .first()
                    .map(|batch| batch.resource_type.clone())
                    .unwrap_or_default(),
            ),
            NotificationMessage::Failure(_) => Event::PublishFailure,
        });
        if self.fail_publishes {
            return Err(Error::publish("broker unreachable"));
        }
        Ok(())
    }

    fn queue_name(&self) -> &str {
        "azure.resources"
    }
}

/// Worker wired to the given doubles with default settings
pub fn worker(
    provider: MockCloudProvider,
    store: RecordingStore,
    channel: RecordingChannel,
) -> SyncWorker {
    SyncWorker::new(
        Arc::new(SessionManager::new(Arc::new(provider))),
        Arc::new(store),
        Arc::new(channel),
        WorkerConfig::default(),
    )
}
