// # File Snapshot Store
//
// File-based implementation of SnapshotStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: write to `.tmp`, then rename over the snapshot file
// - Backup: the previous file is copied to `.backup` before each rename
// - Recovery: an unparseable snapshot file is replaced by its backup
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entities": [
//     {
//       "namespace": "tenant-a",
//       "kind": "AZURE_Resources",
//       "key": "VM",
//       "account_id": "prod",
//       "resource_type": "VM",
//       "resource_data": "[...]",
//       "last_updated": "2025-01-09T12:00:00Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::snapshot_store::{SnapshotEntity, SnapshotStore, SnapshotStoreFactory};

const SNAPSHOT_FILE_VERSION: &str = "1.0";

type EntityKey = (String, String, String);

/// File-backed snapshot store
///
/// Every mutation rewrites the whole file while holding the write lock, so
/// the file always reflects a consistent map and concurrent upserts of the
/// same key resolve as last writer wins. The in-memory map only changes
/// once the file write has succeeded.
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    entities: RwLock<BTreeMap<EntityKey, SnapshotEntity>>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SnapshotFile {
    version: String,
    entities: Vec<SnapshotEntity>,
}

enum LoadError {
    /// File exists but does not parse
    Corrupt(String),
    Io(Error),
}

impl FileSnapshotStore {
    /// Open the snapshot file, creating parent directories as needed
    ///
    /// A corrupted file is recovered from `.backup`; if that fails too the
    /// store starts empty.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create snapshot directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entities = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            entities: RwLock::new(entities),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<EntityKey, SnapshotEntity>, Error> {
        match Self::load(path).await {
            Ok(entities) => {
                tracing::debug!("Loaded {} snapshot entities", entities.len());
                Ok(entities)
            }
            Err(LoadError::Io(e)) => Err(e),
            Err(LoadError::Corrupt(reason)) => {
                tracing::warn!(
                    "Snapshot file {} is corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    reason
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No snapshot backup found. Starting empty.");
                    return Ok(BTreeMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(entities) => {
                        tracing::info!("Recovered {} snapshot entities from backup", entities.len());
                        if let Err(e) = fs::copy(&backup_path, path).await {
                            tracing::error!("Failed to restore snapshot file from backup: {}", e);
                        }
                        Ok(entities)
                    }
                    Err(_) => {
                        tracing::error!("Snapshot backup is unusable too. Starting empty.");
                        Ok(BTreeMap::new())
                    }
                }
            }
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<EntityKey, SnapshotEntity>, LoadError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Io(Error::persist(format!(
                "Failed to read snapshot file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: SnapshotFile =
            serde_json::from_str(&content).map_err(|e| LoadError::Corrupt(e.to_string()))?;

        if file.version != SNAPSHOT_FILE_VERSION {
            tracing::warn!(
                "Snapshot file version {} differs from {}; loading anyway",
                file.version,
                SNAPSHOT_FILE_VERSION
            );
        }

        Ok(file
            .entities
            .into_iter()
            .map(|e| (e.store_key(), e))
            .collect())
    }

    /// Write the map to disk; the caller holds the write lock
    async fn write_locked(&self, entities: &BTreeMap<EntityKey, SnapshotEntity>) -> Result<(), Error> {
        let file = SnapshotFile {
            version: SNAPSHOT_FILE_VERSION.to_string(),
            entities: entities.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::persist(format!("Failed to serialize snapshots: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persist(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::persist(format!("Failed to write {}: {}", temp_path.display(), e))
            })?;
            temp.flush().await.map_err(|e| {
                Error::persist(format!("Failed to flush {}: {}", temp_path.display(), e))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to back up snapshot file: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persist(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Snapshots written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn upsert(&self, entity: &SnapshotEntity) -> Result<(), Error> {
        let mut guard = self.entities.write().await;
        let mut updated = guard.clone();
        updated.insert(entity.store_key(), entity.clone());
        self.write_locked(&updated).await?;
        *guard = updated;
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        kind: &str,
        key: &str,
    ) -> Result<Option<SnapshotEntity>, Error> {
        let guard = self.entities.read().await;
        Ok(guard
            .get(&(namespace.to_string(), kind.to_string(), key.to_string()))
            .cloned())
    }

    async fn list(&self, namespace: &str, kind: &str) -> Result<Vec<SnapshotEntity>, Error> {
        let guard = self.entities.read().await;
        Ok(guard
            .values()
            .filter(|e| e.namespace == namespace && e.kind == kind)
            .cloned()
            .collect())
    }

    async fn delete(&self, namespace: &str, kind: &str, key: &str) -> Result<(), Error> {
        let mut guard = self.entities.write().await;
        let mut updated = guard.clone();
        if updated
            .remove(&(namespace.to_string(), kind.to_string(), key.to_string()))
            .is_some()
        {
            self.write_locked(&updated).await?;
            *guard = updated;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        let guard = self.entities.write().await;
        self.write_locked(&guard).await
    }
}

/// Factory for `{"type": "file", "path": "..."}`
pub struct FileSnapshotStoreFactory;

#[async_trait]
impl SnapshotStoreFactory for FileSnapshotStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn SnapshotStore>, Error> {
        let path = config
            .get("path")
            .and_then(|p| p.as_str())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config("File snapshot store requires a path"))?;

        Ok(Box::new(FileSnapshotStore::new(path).await?))
    }
}
