//! Provider session manager
//!
//! Authenticates accounts against the configured [`CloudProvider`] and keeps
//! the resulting sessions in a registry keyed by an opaque account key.
//!
//! ## Failure Reporting
//!
//! Retrieval operations never return errors. A missing session or a failed
//! provider call is logged and reported as `None`; an empty collection is a
//! legitimate `Some(vec![])`. Callers decide whether `None` is fatal.
//!
//! ## Concurrency
//!
//! The registry is a `tokio::sync::RwLock<HashMap>`; locks are released
//! before any provider call is awaited.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::resources::{
    Network, NetworkInterface, SecurityGroup, VirtualMachine, in_resource_group,
};
use crate::traits::{CloudProvider, CredentialBundle, ProviderSession};

pub struct SessionManager {
    provider: Arc<dyn CloudProvider>,
    sessions: RwLock<HashMap<String, Arc<dyn ProviderSession>>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            provider,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Authenticate and register a session under `account_key`
    ///
    /// The bundle is validated first; an incomplete bundle fails with
    /// `Error::MissingCredentialField` and the provider is never called.
    /// An existing session under the same key is replaced.
    pub async fn open(
        &self,
        account_key: &str,
        bundle: &CredentialBundle,
    ) -> Result<Arc<dyn ProviderSession>> {
        if account_key.is_empty() {
            return Err(Error::invalid_input("Account key cannot be empty"));
        }

        if let Err(e) = bundle.validate() {
            warn!(
                account_key,
                "Not connecting to {}: {}",
                self.provider.provider_name(),
                e
            );
            return Err(e);
        }

        let session = self.provider.authenticate(bundle).await.map_err(|e| {
            error!(account_key, "Authentication failed: {}", e);
            match e {
                Error::Authentication(_) => e,
                other => Error::auth(other.to_string()),
            }
        })?;

        info!(
            account_key,
            subscription_id = session.subscription_id(),
            "Connected to {}",
            self.provider.provider_name()
        );

        self.sessions
            .write()
            .await
            .insert(account_key.to_string(), Arc::clone(&session));

        Ok(session)
    }

    /// Drop the session registered under `account_key`
    ///
    /// Returns `true` if a session was removed.
    pub async fn close(&self, account_key: &str) -> bool {
        let removed = self.sessions.write().await.remove(account_key).is_some();
        if removed {
            debug!(account_key, "Session closed");
        }
        removed
    }

    /// Provider name as shown to operators
    pub fn provider_display_name(&self) -> &'static str {
        self.provider.display_name()
    }

    pub async fn session(&self, account_key: &str) -> Option<Arc<dyn ProviderSession>> {
        self.sessions.read().await.get(account_key).cloned()
    }

    /// Like [`session`](Self::session), failing with `Error::SessionNotFound`
    pub async fn require_session(&self, account_key: &str) -> Result<Arc<dyn ProviderSession>> {
        self.session(account_key)
            .await
            .ok_or_else(|| Error::SessionNotFound(account_key.to_string()))
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Managed security groups, optionally restricted to one resource group
    ///
    /// A group is managed when its tags contain the sentinel key
    /// [`MANAGED_TAG_KEY`](crate::resources::MANAGED_TAG_KEY). The resource
    /// group filter is a case-insensitive exact match; `None` or `""`
    /// disables it.
    pub async fn list_managed_security_groups(
        &self,
        account_key: &str,
        resource_group: Option<&str>,
    ) -> Option<Vec<SecurityGroup>> {
        let all = self
            .call(account_key, "security groups", |s| async move {
                s.list_security_groups().await
            })
            .await?;

        let total = all.len();
        let managed: Vec<SecurityGroup> = all
            .into_iter()
            .filter(|group| {
                if !group.is_managed() {
                    debug!("Retrieved unmanaged security group {} - ignoring", group.name);
                    return false;
                }
                if !in_resource_group(&group.resource_group_name, resource_group) {
                    debug!(
                        "Managed security group {} is in resource group {} - ignoring",
                        group.name, group.resource_group_name
                    );
                    return false;
                }
                true
            })
            .collect();

        debug!(
            account_key,
            "Found a total of {} security groups out of which {} are managed",
            total,
            managed.len()
        );
        Some(managed)
    }

    /// All security groups, optionally restricted to one resource group
    pub async fn list_security_groups(
        &self,
        account_key: &str,
        resource_group: Option<&str>,
    ) -> Option<Vec<SecurityGroup>> {
        let all = self
            .call(account_key, "security groups", |s| async move {
                s.list_security_groups().await
            })
            .await?;

        let total = all.len();
        let groups: Vec<SecurityGroup> = all
            .into_iter()
            .filter(|group| in_resource_group(&group.resource_group_name, resource_group))
            .collect();

        debug!(
            account_key,
            "Found a total of {} security groups, {} after resource group filter",
            total,
            groups.len()
        );
        Some(groups)
    }

    pub async fn get_security_group(&self, account_key: &str, id: &str) -> Option<SecurityGroup> {
        let id = id.to_string();
        self.call(account_key, "security group", |s| async move {
            s.get_security_group(&id).await
        })
        .await
    }

    pub async fn list_virtual_machines(&self, account_key: &str) -> Option<Vec<VirtualMachine>> {
        let vms = self
            .call(account_key, "virtual machines", |s| async move {
                s.list_virtual_machines().await
            })
            .await?;
        debug!(account_key, "Found a total of {} virtual machines", vms.len());
        Some(vms)
    }

    pub async fn list_networks(&self, account_key: &str) -> Option<Vec<Network>> {
        let networks = self
            .call(account_key, "networks", |s| async move { s.list_networks().await })
            .await?;
        debug!(account_key, "Found a total of {} networks", networks.len());
        Some(networks)
    }

    pub async fn list_network_interfaces(
        &self,
        account_key: &str,
    ) -> Option<Vec<NetworkInterface>> {
        let nics = self
            .call(account_key, "network interfaces", |s| async move {
                s.list_network_interfaces().await
            })
            .await?;
        debug!(account_key, "Found a total of {} network interfaces", nics.len());
        Some(nics)
    }

    /// Set or remove the security group of a network interface
    ///
    /// `None` removes the association. Returns `true` only when the update
    /// round-trip succeeded.
    pub async fn assign_security_group(
        &self,
        account_key: &str,
        network_interface_id: &str,
        security_group: Option<&SecurityGroup>,
    ) -> bool {
        let nic_id = network_interface_id.to_string();
        let group_id = security_group.map(|g| g.id.clone());

        let result = self
            .call(account_key, "network interface update", |s| async move {
                s.set_network_interface_security_group(&nic_id, group_id.as_deref())
                    .await
            })
            .await;

        match (result, security_group) {
            (Some(()), Some(group)) => {
                info!(
                    account_key,
                    "Assigned security group {} to network interface {}",
                    group.name,
                    network_interface_id
                );
                true
            }
            (Some(()), None) => {
                info!(
                    account_key,
                    "Removed security group from network interface {}", network_interface_id
                );
                true
            }
            (None, _) => false,
        }
    }

    /// Run one provider call against the session under `account_key`
    async fn call<T, F, Fut>(&self, account_key: &str, what: &str, f: F) -> Option<T>
    where
        F: FnOnce(Arc<dyn ProviderSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if account_key.is_empty() {
            warn!("Cannot retrieve {}: no account key given", what);
            return None;
        }

        let session = match self.require_session(account_key).await {
            Ok(session) => session,
            Err(e) => {
                warn!(account_key, category = ?e.category(), "Cannot retrieve {}: {}", what, e);
                return None;
            }
        };

        match f(session).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!(account_key, category = ?e.category(), "Error retrieving {}: {}", what, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("provider", &self.provider.provider_name())
            .finish_non_exhaustive()
    }
}
