//! Configuration types for the synchronization pipeline
//!
//! Every pluggable component is selected by a `type` tag. Built-in types are
//! listed as variants; anything else goes through `custom` and a factory
//! registered under that name.

use serde::{Deserialize, Serialize};

/// Default queue for resource notifications
pub const DEFAULT_QUEUE_NAME: &str = "azure.resources";

/// Default entity kind in the snapshot store
pub const DEFAULT_ENTITY_KIND: &str = "AZURE_Resources";

/// Azure AD authority of the public cloud
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Resource Manager endpoint of the public cloud
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Main synchronization configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Cloud provider configuration
    pub provider: ProviderConfig,

    /// Snapshot store configuration
    pub snapshot_store: SnapshotStoreConfig,

    /// Notification channel configuration
    pub notification: NotificationConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl SyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.snapshot_store.validate()?;
        self.notification.validate()?;
        self.worker.validate()?;
        self.schedule.validate()?;
        Ok(())
    }
}

/// Cloud provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Azure Resource Manager
    Azure {
        /// OAuth2 authority, e.g. `https://login.microsoftonline.com`
        #[serde(default = "default_authority_host")]
        authority_host: String,
        /// ARM endpoint, e.g. `https://management.azure.com`
        #[serde(default = "default_management_endpoint")]
        management_endpoint: String,
        /// Per-request HTTP timeout
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Azure with public-cloud endpoints
    pub fn azure() -> Self {
        ProviderConfig::Azure {
            authority_host: default_authority_host(),
            management_endpoint: default_management_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Azure {
                authority_host,
                management_endpoint,
                request_timeout_secs,
            } => {
                for (name, url) in [
                    ("authority host", authority_host),
                    ("management endpoint", management_endpoint),
                ] {
                    if !url.starts_with("https://") && !url.starts_with("http://") {
                        return Err(crate::Error::config(format!(
                            "Azure {} must be an http(s) URL, got '{}'",
                            name, url
                        )));
                    }
                }
                if *request_timeout_secs == 0 {
                    return Err(crate::Error::config("Azure request timeout must be > 0"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Azure { .. } => "azure",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::azure()
    }
}

fn default_authority_host() -> String {
    DEFAULT_AUTHORITY_HOST.to_string()
}

fn default_management_endpoint() -> String {
    DEFAULT_MANAGEMENT_ENDPOINT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Snapshot store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotStoreConfig {
    /// JSON file store
    File {
        /// Path to the snapshot file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        factory: String,
        config: serde_json::Value,
    },
}

impl SnapshotStoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SnapshotStoreConfig::File { path } if path.is_empty() => Err(crate::Error::config(
                "Snapshot file path cannot be empty",
            )),
            SnapshotStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom snapshot store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            SnapshotStoreConfig::File { .. } => "file",
            SnapshotStoreConfig::Memory => "memory",
            SnapshotStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Notification channel configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationConfig {
    /// RabbitMQ through its management HTTP API
    #[serde(rename = "rabbitmq")]
    RabbitMq {
        /// Management API base URL, e.g. `http://localhost:15672`
        api_url: String,
        username: String,
        /// ⚠️ NEVER log this value
        password: String,
        #[serde(default = "default_vhost")]
        vhost: String,
        #[serde(default = "default_queue_name")]
        queue: String,
    },

    /// In-process queue
    Memory {
        #[serde(default = "default_queue_name")]
        queue: String,
    },

    /// Custom channel
    Custom {
        factory: String,
        config: serde_json::Value,
    },
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationConfig::RabbitMq {
                api_url,
                username,
                vhost,
                queue,
                ..
            } => f
                .debug_struct("RabbitMq")
                .field("api_url", api_url)
                .field("username", username)
                .field("password", &"<REDACTED>")
                .field("vhost", vhost)
                .field("queue", queue)
                .finish(),
            NotificationConfig::Memory { queue } => {
                f.debug_struct("Memory").field("queue", queue).finish()
            }
            NotificationConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotificationConfig::RabbitMq {
                api_url,
                username,
                queue,
                ..
            } => {
                if !api_url.starts_with("https://") && !api_url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "RabbitMQ API URL must be an http(s) URL, got '{}'",
                        api_url
                    )));
                }
                if username.is_empty() {
                    return Err(crate::Error::config("RabbitMQ username cannot be empty"));
                }
                if queue.is_empty() {
                    return Err(crate::Error::config("Queue name cannot be empty"));
                }
                Ok(())
            }
            NotificationConfig::Memory { queue } if queue.is_empty() => {
                Err(crate::Error::config("Queue name cannot be empty"))
            }
            NotificationConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom notification factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            NotificationConfig::RabbitMq { .. } => "rabbitmq",
            NotificationConfig::Memory { .. } => "memory",
            NotificationConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig::Memory {
            queue: default_queue_name(),
        }
    }
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_queue_name() -> String {
    DEFAULT_QUEUE_NAME.to_string()
}

/// Worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Entity kind used for snapshot entities
    #[serde(default = "default_entity_kind")]
    pub entity_kind: String,

    /// `sourceSystemType` written into notification envelopes
    #[serde(default = "default_source_system_type")]
    pub source_system_type: String,

    /// Upper bound on runs executing at the same time
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.entity_kind.is_empty() {
            return Err(crate::Error::config("Entity kind cannot be empty"));
        }
        if self.max_concurrent_runs == 0 {
            return Err(crate::Error::config("max_concurrent_runs must be > 0"));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            entity_kind: default_entity_kind(),
            source_system_type: default_source_system_type(),
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

fn default_entity_kind() -> String {
    DEFAULT_ENTITY_KIND.to_string()
}

fn default_source_system_type() -> String {
    "azure".to_string()
}

fn default_max_concurrent_runs() -> usize {
    8
}

/// Periodic trigger settings used by the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between two sync rounds over all accounts
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Run a round immediately at startup
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Sync interval must be > 0"));
        }
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_startup: default_run_on_startup(),
        }
    }
}

fn default_interval_secs() -> u64 {
    900
}

fn default_run_on_startup() -> bool {
    true
}
