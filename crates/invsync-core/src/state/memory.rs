// # Memory Snapshot Store
//
// In-memory implementation of SnapshotStore.
//
// ## Crash Behavior
//
// - All snapshots are lost on restart
// - Consumers only see data again after the next successful run
//
// ## When to Use
//
// - Tests
// - Deployments where the notification stream is the only consumer

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::snapshot_store::{SnapshotEntity, SnapshotStore, SnapshotStoreFactory};

type EntityKey = (String, String, String);

/// In-memory snapshot store
///
/// Entities live in a `BTreeMap` keyed by (namespace, kind, key) behind a
/// `RwLock`. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<RwLock<BTreeMap<EntityKey, SnapshotEntity>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entities across all namespaces
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Remove every entity
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn upsert(&self, entity: &SnapshotEntity) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(entity.store_key(), entity.clone());
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        kind: &str,
        key: &str,
    ) -> Result<Option<SnapshotEntity>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(&(namespace.to_string(), kind.to_string(), key.to_string()))
            .cloned())
    }

    async fn list(&self, namespace: &str, kind: &str) -> Result<Vec<SnapshotEntity>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .values()
            .filter(|e| e.namespace == namespace && e.kind == kind)
            .cloned()
            .collect())
    }

    async fn delete(&self, namespace: &str, kind: &str, key: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(&(namespace.to_string(), kind.to_string(), key.to_string()));
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

/// Factory for `{"type": "memory"}`
pub struct MemorySnapshotStoreFactory;

#[async_trait]
impl SnapshotStoreFactory for MemorySnapshotStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn SnapshotStore>, Error> {
        Ok(Box::new(MemorySnapshotStore::new()))
    }
}
