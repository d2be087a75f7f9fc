// # Cloud Provider Trait
//
// Defines the interface for reading infrastructure inventory from a cloud
// account.
//
// ## Purpose
//
// A provider turns a credential bundle into an authenticated session. The
// session lists resource collections and performs the one mutation the
// platform needs (security group assignment on a network interface).
//
// ## Implementations
//
// - `invsync-provider-azure`: Azure Resource Manager
//
// ## Usage
//
// ```rust,ignore
// use invsync_core::traits::CloudProvider;
//
// let session = provider.authenticate(&bundle).await?;
// let groups = session.list_security_groups().await?;
// ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::resources::{Network, NetworkInterface, SecurityGroup, VirtualMachine};
use crate::traits::credentials::CredentialBundle;

/// Trait for cloud provider implementations
///
/// # Trust Level: Untrusted (Provider)
///
/// Providers perform HTTP calls to their own endpoints and parse responses.
/// They must not retry, spawn tasks, or touch the snapshot store; failure
/// policy is owned by the `SyncWorker`.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Exchange a credential bundle for an authenticated session
    ///
    /// Exactly one credential exchange is made. The bundle has already been
    /// validated by the caller.
    ///
    /// # Returns
    ///
    /// - `Ok(session)`: Session scoped to the bundle's subscription
    /// - `Err(Error::Authentication)`: Credentials were rejected
    async fn authenticate(&self, bundle: &CredentialBundle) -> Result<Arc<dyn ProviderSession>>;

    /// Get the provider name (e.g. "azure")
    fn provider_name(&self) -> &'static str;

    /// Human-readable provider name for failure notifications
    fn display_name(&self) -> &'static str {
        self.provider_name()
    }
}

/// Authenticated handle bound to one subscription
///
/// Listing calls return the complete collection. A failure on any page fails
/// the whole call.
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// Subscription this session reads from
    fn subscription_id(&self) -> &str;

    async fn list_networks(&self) -> Result<Vec<Network>>;

    async fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>>;

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>>;

    async fn list_network_interfaces(&self) -> Result<Vec<NetworkInterface>>;

    /// Fetch a single security group by its full resource id
    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup>;

    /// Associate a security group with a network interface
    ///
    /// `None` removes the current association.
    async fn set_network_interface_security_group(
        &self,
        network_interface_id: &str,
        security_group_id: Option<&str>,
    ) -> Result<()>;
}

/// Helper trait for constructing cloud providers from configuration
pub trait CloudProviderFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn CloudProvider>>;
}
