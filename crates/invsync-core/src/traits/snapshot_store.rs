// # Snapshot Store Trait
//
// Defines the interface for the namespaced document store holding the latest
// inventory snapshot of each tenant.
//
// ## Data Model
//
// - namespace: platform tenant id
// - kind: fixed entity kind (`AZURE_Resources`)
// - key: resource type (`Network`, `VM`, `SecurityGroup`, `NetworkInterface`)
//
// One entity exists per (namespace, kind, key). Writing the same key again
// replaces `resource_data` and `last_updated`; no history is kept.
//
// ## Implementations
//
// - `MemorySnapshotStore`: in-process map
// - `FileSnapshotStore`: JSON file with atomic writes and backup recovery

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Timestamp layout used in stored and published documents
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Latest snapshot of one resource type for one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub namespace: String,
    pub kind: String,
    pub key: String,
    pub account_id: String,
    pub resource_type: String,
    /// JSON-encoded array of projected resources (not indexed)
    pub resource_data: String,
    pub last_updated: DateTime<Utc>,
}

impl SnapshotEntity {
    /// `last_updated` rendered with [`TIMESTAMP_FORMAT`]
    pub fn last_updated_text(&self) -> String {
        self.last_updated.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Identity of the entity within the store
    pub fn store_key(&self) -> (String, String, String) {
        (
            self.namespace.clone(),
            self.kind.clone(),
            self.key.clone(),
        )
    }
}

/// Trait for snapshot store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. Concurrent upserts of the
/// same key resolve as last writer wins.
///
/// # Trust Level: Trusted (Core Component)
///
/// Stores perform their own I/O and locking. They never decide what to
/// write; that is owned by the `SyncWorker`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Create or fully replace an entity
    async fn upsert(&self, entity: &SnapshotEntity) -> Result<()>;

    /// Get one entity
    ///
    /// # Returns
    ///
    /// - `Ok(Some(entity))`: Entity exists
    /// - `Ok(None)`: No entity under that key
    /// - `Err(Error)`: Storage error
    async fn get(&self, namespace: &str, kind: &str, key: &str) -> Result<Option<SnapshotEntity>>;

    /// All entities of a kind within a namespace, ordered by key
    async fn list(&self, namespace: &str, kind: &str) -> Result<Vec<SnapshotEntity>>;

    /// Delete an entity (no-op when absent)
    async fn delete(&self, namespace: &str, kind: &str, key: &str) -> Result<()>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<()>;
}

/// Helper trait for constructing snapshot stores from configuration
#[async_trait]
pub trait SnapshotStoreFactory: Send + Sync {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn SnapshotStore>>;
}
