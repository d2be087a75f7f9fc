//! Plugin-based component registry
//!
//! Cloud providers, snapshot stores, and notification channels are created
//! from configuration through factories registered by type name.
//!
//! ## Registration
//!
//! Plugin crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("azure", Box::new(AzureProviderFactory));
//! }
//! ```
//!
//! The built-in memory/file stores and the memory channel are available
//! through [`ProviderRegistry::with_builtins`].

use crate::config::{NotificationConfig, ProviderConfig, SnapshotStoreConfig};
use crate::error::{Error, Result};
use crate::notify::MemoryChannelFactory;
use crate::state::{FileSnapshotStoreFactory, MemorySnapshotStoreFactory};
use crate::traits::{
    CloudProvider, CloudProviderFactory, NotificationChannel, NotificationChannelFactory,
    SnapshotStore, SnapshotStoreFactory,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of component factories
///
/// Interior mutability through `std::sync::RwLock`; locks are never held
/// across an `.await`.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn CloudProviderFactory>>>,
    snapshot_stores: RwLock<HashMap<String, Arc<dyn SnapshotStoreFactory>>>,
    channels: RwLock<HashMap<String, Arc<dyn NotificationChannelFactory>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the in-crate stores and channel already registered
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_snapshot_store("memory", Box::new(MemorySnapshotStoreFactory));
        registry.register_snapshot_store("file", Box::new(FileSnapshotStoreFactory));
        registry.register_channel("memory", Box::new(MemoryChannelFactory));
        registry
    }

    /// Register a cloud provider factory (e.g. "azure")
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn CloudProviderFactory>) {
        write(&self.providers).insert(name.into(), factory);
    }

    /// Register a snapshot store factory (e.g. "file", "memory")
    pub fn register_snapshot_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn SnapshotStoreFactory>,
    ) {
        write(&self.snapshot_stores).insert(name.into(), Arc::from(factory));
    }

    /// Register a notification channel factory (e.g. "rabbitmq")
    pub fn register_channel(
        &self,
        name: impl Into<String>,
        factory: Box<dyn NotificationChannelFactory>,
    ) {
        write(&self.channels).insert(name.into(), Arc::from(factory));
    }

    /// Create a cloud provider from configuration
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: The provider type is not registered
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn CloudProvider>> {
        let provider_type = config.type_name();
        let providers = read(&self.providers);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a snapshot store from configuration
    pub async fn create_snapshot_store(
        &self,
        config: &SnapshotStoreConfig,
    ) -> Result<Box<dyn SnapshotStore>> {
        let store_type = config.type_name();
        let factory = read(&self.snapshot_stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown snapshot store type: {}", store_type)))?;

        let config_json = match config {
            SnapshotStoreConfig::Custom { config, .. } => config.clone(),
            other => serde_json::to_value(other)?,
        };

        factory.create(&config_json).await
    }

    /// Create a notification channel from configuration
    pub async fn create_channel(
        &self,
        config: &NotificationConfig,
    ) -> Result<Box<dyn NotificationChannel>> {
        let channel_type = config.type_name();
        let factory = read(&self.channels)
            .get(channel_type)
            .cloned()
            .ok_or_else(|| {
                Error::config(format!("Unknown notification channel type: {}", channel_type))
            })?;

        factory.create(config).await
    }

    pub fn list_providers(&self) -> Vec<String> {
        read(&self.providers).keys().cloned().collect()
    }

    pub fn list_snapshot_stores(&self) -> Vec<String> {
        read(&self.snapshot_stores).keys().cloned().collect()
    }

    pub fn list_channels(&self) -> Vec<String> {
        read(&self.channels).keys().cloned().collect()
    }

    pub fn has_provider(&self, name: &str) -> bool {
        read(&self.providers).contains_key(name)
    }

    pub fn has_snapshot_store(&self, name: &str) -> bool {
        read(&self.snapshot_stores).contains_key(name)
    }

    pub fn has_channel(&self, name: &str) -> bool {
        read(&self.channels).contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl CloudProviderFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn CloudProvider>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_provider("mock"));

        registry.register_provider("mock", Box::new(MockProviderFactory));

        assert!(registry.has_provider("mock"));
        assert!(registry.list_providers().contains(&"mock".to_string()));
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new();
        let result = registry.create_provider(&ProviderConfig::azure());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_builtins_create_stores_and_channel() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.has_snapshot_store("file"));
        assert!(registry.has_snapshot_store("memory"));
        assert!(registry.has_channel("memory"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.json");
        let store = registry
            .create_snapshot_store(&SnapshotStoreConfig::File {
                path: path.display().to_string(),
            })
            .await;
        assert!(store.is_ok());

        let channel = registry
            .create_channel(&NotificationConfig::default())
            .await
            .unwrap();
        assert_eq!(channel.queue_name(), "azure.resources");
    }
}
