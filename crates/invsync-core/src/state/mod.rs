// # Snapshot Store Implementations
//
// Memory and file-backed stores, plus the read-back view that assembles a
// tenant's stored snapshots into one resources document.

pub mod file;
pub mod memory;

pub use file::{FileSnapshotStore, FileSnapshotStoreFactory};
pub use memory::{MemorySnapshotStore, MemorySnapshotStoreFactory};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::traits::{ResourceBatch, SnapshotStore};

/// All stored snapshots of one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument {
    pub data_type: String,
    pub source_system_type: String,
    pub source_system_app_id: String,
    pub data: Vec<ResourceBatch>,
}

/// Assemble every stored snapshot of `namespace` into a [`ResourceDocument`]
///
/// Entities without a resource type are skipped. A stored payload that no
/// longer parses is passed through as a JSON string.
pub async fn read_resource_document(
    store: &dyn SnapshotStore,
    namespace: &str,
    kind: &str,
    source_system_type: &str,
    app_id: &str,
) -> Result<ResourceDocument> {
    let entities = store.list(namespace, kind).await?;

    let data = entities
        .into_iter()
        .filter(|e| !e.resource_type.is_empty())
        .map(|e| {
            let resource_data = serde_json::from_str(&e.resource_data).unwrap_or_else(|err| {
                tracing::warn!(
                    namespace,
                    key = %e.key,
                    "Stored snapshot is not valid JSON: {}",
                    err
                );
                serde_json::Value::String(e.resource_data.clone())
            });
            ResourceBatch {
                last_updated: e.last_updated_text(),
                resource_type: e.resource_type.clone(),
                resource_data,
            }
        })
        .collect();

    Ok(ResourceDocument {
        data_type: "resources".to_string(),
        source_system_type: source_system_type.to_string(),
        source_system_app_id: app_id.to_string(),
        data,
    })
}
