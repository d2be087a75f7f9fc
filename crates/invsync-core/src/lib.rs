// # invsync-core
//
// Core library for the cloud inventory synchronization pipeline.
//
// ## Architecture Overview
//
// - **CloudProvider / ProviderSession**: Authenticate an account and list its resources
// - **SessionManager**: Registry of authenticated sessions, managed-tag filtering
// - **SnapshotStore**: Latest snapshot per (tenant, resource type)
// - **NotificationChannel**: Announces each stored snapshot on a queue
// - **SyncWorker**: AUTHENTICATE → Network → VM → SecurityGroup → NetworkInterface
// - **SyncDispatcher**: Fire-and-forget, bounded execution of runs
// - **ProviderRegistry**: Factories for pluggable components
//
// ## Design Principles
//
// 1. **Fail fast on fetch**: a failed listing stops the run with one failure notification
// 2. **Best effort on output**: persist and publish failures are logged, never fatal
// 3. **No retries**: every remote call is made once per run
// 4. **Session per run**: concurrent runs never share a provider session

pub mod accounts;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod registry;
pub mod resources;
pub mod session;
pub mod state;
pub mod traits;

pub use accounts::{AccountRecord, StaticCredentialResolver};
pub use config::{
    NotificationConfig, ProviderConfig, ScheduleConfig, SnapshotStoreConfig, SyncConfig,
    WorkerConfig,
};
pub use engine::{
    ResourceKind, SyncDispatcher, SyncOutcome, SyncReport, SyncRequest, SyncStage, SyncWorker,
};
pub use error::{CredentialField, Error, ErrorCategory, Result};
pub use notify::MemoryChannel;
pub use registry::ProviderRegistry;
pub use session::SessionManager;
pub use state::{FileSnapshotStore, MemorySnapshotStore, read_resource_document};
pub use traits::{
    CloudProvider, CredentialBundle, CredentialResolver, NotificationChannel, ProviderSession,
    SnapshotStore,
};
