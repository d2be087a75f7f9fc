//! Core traits for the synchronization pipeline
//!
//! - [`CloudProvider`] / [`ProviderSession`]: Read inventory from a cloud account
//! - [`SnapshotStore`]: Latest-snapshot document store
//! - [`NotificationChannel`]: Announce snapshot updates on a queue
//! - [`CredentialResolver`]: Look up account credentials

pub mod cloud_provider;
pub mod credentials;
pub mod notification;
pub mod snapshot_store;

pub use cloud_provider::{CloudProvider, CloudProviderFactory, ProviderSession};
pub use credentials::{CredentialBundle, CredentialResolver};
pub use notification::{
    Correlation, Delivery, NotificationChannel, NotificationChannelFactory, NotificationMessage,
    ResourceBatch, ResourceEnvelope,
};
pub use snapshot_store::{SnapshotEntity, SnapshotStore, SnapshotStoreFactory, TIMESTAMP_FORMAT};
