// # Notification Channel Trait
//
// Defines the interface for announcing snapshot updates to downstream
// consumers over a single named queue.
//
// ## Message Bodies
//
// Success (one per resource type):
//
// ```json
// {
//   "dataType": "resources",
//   "sourceSystemType": "azure",
//   "sourceSystemProjectId": "<app id>",
//   "data": [{"lastUpdated": "2025-01-09 12:00:00", "resourceType": "VM", "resourceData": [...]}]
// }
// ```
//
// Failure (at most one per run): a plain-text reason.
//
// The correlation id travels as message metadata, never in the body.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::error::Result;

/// Identifies the run a message belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub tenant_id: String,
    pub account_id: String,
    pub run_id: Uuid,
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.account_id, self.run_id)
    }
}

/// One resource-type snapshot inside an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBatch {
    pub last_updated: String,
    pub resource_type: String,
    pub resource_data: serde_json::Value,
}

/// Success message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEnvelope {
    pub data_type: String,
    pub source_system_type: String,
    pub source_system_project_id: String,
    pub data: Vec<ResourceBatch>,
}

impl ResourceEnvelope {
    /// Envelope carrying a single resource batch
    pub fn single(
        source_system_type: impl Into<String>,
        app_id: impl Into<String>,
        batch: ResourceBatch,
    ) -> Self {
        Self {
            data_type: "resources".to_string(),
            source_system_type: source_system_type.into(),
            source_system_project_id: app_id.into(),
            data: vec![batch],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationMessage {
    Resources(ResourceEnvelope),
    Failure(String),
}

impl NotificationMessage {
    /// Encoded message body
    pub fn body(&self) -> Result<String> {
        match self {
            NotificationMessage::Resources(envelope) => Ok(serde_json::to_string(envelope)?),
            NotificationMessage::Failure(reason) => Ok(reason.clone()),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            NotificationMessage::Resources(_) => "application/json",
            NotificationMessage::Failure(_) => "text/plain",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, NotificationMessage::Failure(_))
    }
}

/// A message plus the run it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub correlation: Correlation,
    pub message: NotificationMessage,
}

/// Trait for notification channel implementations
///
/// A channel publishes to exactly one queue. Publishing must not block on
/// consumers.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publish one message
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The broker accepted the message
    /// - `Err(Error::Publish)`: The message was not delivered to the queue
    async fn publish(&self, delivery: &Delivery) -> Result<()>;

    /// Name of the queue this channel publishes to
    fn queue_name(&self) -> &str;
}

/// Helper trait for constructing notification channels from configuration
#[async_trait]
pub trait NotificationChannelFactory: Send + Sync {
    async fn create(&self, config: &NotificationConfig) -> Result<Box<dyn NotificationChannel>>;
}
