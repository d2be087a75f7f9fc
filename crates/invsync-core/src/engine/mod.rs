//! Synchronization worker
//!
//! The [`SyncWorker`] runs one account through the pipeline:
//!
//! ```text
//! AUTHENTICATE ──> Network ──> VM ──> SecurityGroup ──> NetworkInterface ──> DONE
//!      │              │         │           │                  │
//!      └──────────────┴─────────┴───────────┴──────────────────┴──> FAILED
//! ```
//!
//! ## Per-Step Flow
//!
//! 1. Fetch the collection through the [`SessionManager`]
//! 2. Upsert the snapshot entity (tenant namespace, resource-type key)
//! 3. Publish a notification carrying the same JSON array
//!
//! ## Failure Policy
//!
//! - Authentication and fetch failures stop the run and publish exactly one
//!   plain-text failure notification. Snapshots written earlier in the run
//!   stay in place.
//! - Persist and publish failures are logged and counted; the run continues.
//! - Nothing is retried.
//!
//! Every run gets its own session, registered under the run's correlation
//! key and closed when the run ends.

pub mod dispatcher;

pub use dispatcher::SyncDispatcher;

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::ErrorCategory;
use crate::session::SessionManager;
use crate::traits::{
    Correlation, CredentialBundle, Delivery, NotificationChannel, NotificationMessage,
    ResourceBatch, ResourceEnvelope, SnapshotEntity, SnapshotStore, TIMESTAMP_FORMAT,
};

/// Resource types handled by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Network,
    VirtualMachine,
    SecurityGroup,
    NetworkInterface,
}

impl ResourceKind {
    /// Fetch order of a run
    pub const SYNC_ORDER: [ResourceKind; 4] = [
        ResourceKind::Network,
        ResourceKind::VirtualMachine,
        ResourceKind::SecurityGroup,
        ResourceKind::NetworkInterface,
    ];

    /// Snapshot key and `resourceType` value
    pub fn key(&self) -> &'static str {
        match self {
            ResourceKind::Network => "Network",
            ResourceKind::VirtualMachine => "VM",
            ResourceKind::SecurityGroup => "SecurityGroup",
            ResourceKind::NetworkInterface => "NetworkInterface",
        }
    }

    /// Plural name used in log lines and failure notifications
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::Network => "networks",
            ResourceKind::VirtualMachine => "VMs",
            ResourceKind::SecurityGroup => "security groups",
            ResourceKind::NetworkInterface => "network interfaces",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::SYNC_ORDER.into_iter().find(|kind| kind.key() == key)
    }

    /// Fetch and project the collection for this kind
    ///
    /// `None` when the listing failed or the projection could not be encoded.
    pub async fn fetch(
        &self,
        sessions: &SessionManager,
        account_key: &str,
    ) -> Option<serde_json::Value> {
        let projected = match self {
            ResourceKind::Network => serde_json::to_value(sessions.list_networks(account_key).await?),
            ResourceKind::VirtualMachine => {
                serde_json::to_value(sessions.list_virtual_machines(account_key).await?)
            }
            ResourceKind::SecurityGroup => {
                serde_json::to_value(sessions.list_security_groups(account_key, None).await?)
            }
            ResourceKind::NetworkInterface => {
                serde_json::to_value(sessions.list_network_interfaces(account_key).await?)
            }
        };

        match projected {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Failed to encode {}: {}", self.display_name(), e);
                None
            }
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One synchronization request
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub tenant_id: String,
    pub account_id: String,
    pub bundle: CredentialBundle,
}

/// Where a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Authenticate,
    Fetch(ResourceKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    Failed {
        stage: SyncStage,
        category: ErrorCategory,
        reason: String,
    },
}

/// Summary of one run, for logs and tests
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub correlation: Correlation,
    pub outcome: SyncOutcome,
    /// Kinds whose snapshot upsert succeeded
    pub persisted: Vec<ResourceKind>,
    /// Kinds whose success notification was accepted
    pub published: Vec<ResourceKind>,
    pub persist_failures: usize,
    pub publish_failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn new(correlation: Correlation) -> Self {
        let now = Utc::now();
        Self {
            correlation,
            outcome: SyncOutcome::Completed,
            persisted: Vec::new(),
            published: Vec::new(),
            persist_failures: 0,
            publish_failures: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Completed
    }
}

/// Runs the fetch→persist→publish pipeline for one account at a time
pub struct SyncWorker {
    sessions: Arc<SessionManager>,
    snapshot_store: Arc<dyn SnapshotStore>,
    channel: Arc<dyn NotificationChannel>,
    config: WorkerConfig,
}

impl SyncWorker {
    pub fn new(
        sessions: Arc<SessionManager>,
        snapshot_store: Arc<dyn SnapshotStore>,
        channel: Arc<dyn NotificationChannel>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            sessions,
            snapshot_store,
            channel,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Run one account to completion
    ///
    /// Never returns an error; the outcome is reported through the
    /// notification channel and the returned [`SyncReport`].
    pub async fn run(&self, request: SyncRequest) -> SyncReport {
        let correlation = Correlation {
            tenant_id: request.tenant_id.clone(),
            account_id: request.account_id.clone(),
            run_id: Uuid::new_v4(),
        };

        let span = info_span!(
            "sync_run",
            run_id = %correlation.run_id,
            tenant_id = %correlation.tenant_id,
            account_id = %correlation.account_id,
        );

        self.run_with_correlation(request, correlation)
            .instrument(span)
            .await
    }

    async fn run_with_correlation(
        &self,
        request: SyncRequest,
        correlation: Correlation,
    ) -> SyncReport {
        let session_key = correlation.to_string();
        let mut report = SyncReport::new(correlation);

        info!("Starting sync run");

        if let Err(e) = self.sessions.open(&session_key, &request.bundle).await {
            let reason = format!(
                "Won't be able to retrieve any data from {} since no authentication/authorization/connection could be established",
                self.sessions.provider_display_name()
            );
            warn!(category = ?e.category(), "Authentication step failed: {}", e);
            self.fail(&mut report, SyncStage::Authenticate, e.category(), reason)
                .await;
            return report;
        }

        for kind in ResourceKind::SYNC_ORDER {
            debug!("Fetching {}", kind.display_name());

            let Some(resource_data) = kind.fetch(&self.sessions, &session_key).await else {
                let reason = format!(
                    "Error retrieving {} from {} - stopping any further processing",
                    kind.display_name(),
                    self.sessions.provider_display_name()
                );
                self.fail(&mut report, SyncStage::Fetch(kind), ErrorCategory::Fetch, reason)
                    .await;
                self.sessions.close(&session_key).await;
                return report;
            };

            self.persist_and_publish(&mut report, &request, kind, resource_data)
                .await;
        }

        self.sessions.close(&session_key).await;
        report.finished_at = Utc::now();

        info!(
            persist_failures = report.persist_failures,
            publish_failures = report.publish_failures,
            "Sync run completed"
        );
        report
    }

    async fn persist_and_publish(
        &self,
        report: &mut SyncReport,
        request: &SyncRequest,
        kind: ResourceKind,
        resource_data: serde_json::Value,
    ) {
        let last_updated = Utc::now();
        let count = resource_data.as_array().map_or(0, |items| items.len());

        let entity = SnapshotEntity {
            namespace: request.tenant_id.clone(),
            kind: self.config.entity_kind.clone(),
            key: kind.key().to_string(),
            account_id: request.account_id.clone(),
            resource_type: kind.key().to_string(),
            resource_data: resource_data.to_string(),
            last_updated,
        };

        match self.snapshot_store.upsert(&entity).await {
            Ok(()) => {
                debug!("Stored {} {}", count, kind.display_name());
                report.persisted.push(kind);
            }
            Err(e) => {
                error!(
                    category = ?e.category(),
                    "Failed to store {}: {}",
                    kind.display_name(),
                    e
                );
                report.persist_failures += 1;
            }
        }

        let message = NotificationMessage::Resources(ResourceEnvelope::single(
            self.config.source_system_type.clone(),
            request.bundle.app_id.clone(),
            ResourceBatch {
                last_updated: last_updated.format(TIMESTAMP_FORMAT).to_string(),
                resource_type: kind.key().to_string(),
                resource_data,
            },
        ));

        let delivery = Delivery {
            correlation: report.correlation.clone(),
            message,
        };

        match self.channel.publish(&delivery).await {
            Ok(()) => {
                debug!(
                    "Published {} {} to {}",
                    count,
                    kind.display_name(),
                    self.channel.queue_name()
                );
                report.published.push(kind);
            }
            Err(e) => {
                error!(
                    category = ?e.category(),
                    "Failed to publish {} to {}: {}",
                    kind.display_name(),
                    self.channel.queue_name(),
                    e
                );
                report.publish_failures += 1;
            }
        }
    }

    async fn fail(
        &self,
        report: &mut SyncReport,
        stage: SyncStage,
        category: ErrorCategory,
        reason: String,
    ) {
        error!("{}", reason);

        let delivery = Delivery {
            correlation: report.correlation.clone(),
            message: NotificationMessage::Failure(reason.clone()),
        };
        if let Err(e) = self.channel.publish(&delivery).await {
            error!(
                category = ?e.category(),
                "Failed to publish failure notification to {}: {}",
                self.channel.queue_name(),
                e
            );
            report.publish_failures += 1;
        }

        report.outcome = SyncOutcome::Failed {
            stage,
            category,
            reason,
        };
        report.finished_at = Utc::now();
    }
}

impl fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncWorker")
            .field("sessions", &self.sessions)
            .field("queue", &self.channel.queue_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_order_and_keys() {
        let keys: Vec<&str> = ResourceKind::SYNC_ORDER.iter().map(|k| k.key()).collect();
        assert_eq!(keys, vec!["Network", "VM", "SecurityGroup", "NetworkInterface"]);
    }

    #[test]
    fn test_from_key_round_trips_every_kind() {
        for kind in ResourceKind::SYNC_ORDER {
            assert_eq!(ResourceKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(ResourceKind::from_key("VirtualMachine"), None);
    }
}
