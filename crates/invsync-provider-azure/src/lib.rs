// # Azure Inventory Provider
//
// Reads virtual networks, virtual machines, network security groups and
// network interfaces from Azure Resource Manager for the invsync pipeline.
//
// ## Behaviour
//
// - One client-credentials token exchange per session
// - One HTTP request per page; listings follow `nextLink` to the end
// - Status codes map to core errors: 401/403 authentication, 404 not found,
//   429 rate limited, 5xx provider
// - NO retry, backoff or token refresh (failure policy is owned by the SyncWorker)
// - NO background tasks
//
// ## Security Requirements
//
// - Client secret and access token NEVER appear in logs or Debug output
//
// ## API Reference
//
// - Token: POST `{authority}/{directory}/oauth2/v2.0/token`
// - List: GET `/subscriptions/{sub}/providers/Microsoft.Network/{virtualNetworks,networkSecurityGroups,networkInterfaces}`
// - List: GET `/subscriptions/{sub}/providers/Microsoft.Compute/virtualMachines?$expand=instanceView`
// - Update NIC: PUT `{networkInterfaceId}`

mod client;
mod session;
mod wire;

use async_trait::async_trait;
use invsync_core::config::{
    DEFAULT_AUTHORITY_HOST, DEFAULT_MANAGEMENT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_SECS,
    ProviderConfig,
};
use invsync_core::traits::{CloudProvider, CloudProviderFactory, CredentialBundle, ProviderSession};
use invsync_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use session::AzureSession;

/// Azure Resource Manager provider
///
/// Holds endpoints and a shared HTTP client; credentials arrive per call to
/// [`CloudProvider::authenticate`] and are never stored here.
pub struct AzureProvider {
    authority_host: String,
    management_endpoint: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for AzureProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureProvider")
            .field("authority_host", &self.authority_host)
            .field("management_endpoint", &self.management_endpoint)
            .finish_non_exhaustive()
    }
}

impl AzureProvider {
    /// Create a provider for the given endpoints
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: The HTTP client could not be built
    pub fn new(
        authority_host: impl Into<String>,
        management_endpoint: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            authority_host: authority_host.into(),
            management_endpoint: management_endpoint.into(),
            http,
        })
    }

    /// Provider for the Azure public cloud
    pub fn public_cloud() -> Result<Self> {
        Self::new(
            DEFAULT_AUTHORITY_HOST,
            DEFAULT_MANAGEMENT_ENDPOINT,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

#[async_trait]
impl CloudProvider for AzureProvider {
    async fn authenticate(&self, bundle: &CredentialBundle) -> Result<Arc<dyn ProviderSession>> {
        debug!(
            tenant_id = %bundle.tenant_id,
            account_id = %bundle.account_id,
            "Requesting Azure access token"
        );

        let token = client::acquire_token(
            &self.http,
            &self.authority_host,
            &self.management_endpoint,
            bundle,
        )
        .await?;

        let arm = client::ArmClient::new(self.http.clone(), &self.management_endpoint, token);
        Ok(Arc::new(AzureSession::new(arm, bundle.subscription_id.clone())))
    }

    fn provider_name(&self) -> &'static str {
        "azure"
    }

    fn display_name(&self) -> &'static str {
        "Azure"
    }
}

/// Factory for creating Azure providers
pub struct AzureProviderFactory;

impl CloudProviderFactory for AzureProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn CloudProvider>> {
        match config {
            ProviderConfig::Azure {
                authority_host,
                management_endpoint,
                request_timeout_secs,
            } => {
                config.validate()?;
                Ok(Box::new(AzureProvider::new(
                    authority_host.clone(),
                    management_endpoint.clone(),
                    Duration::from_secs(*request_timeout_secs),
                )?))
            }
            _ => Err(Error::config("Invalid config for Azure provider")),
        }
    }
}

/// Register the Azure provider with a registry
///
/// # Example
///
/// ```rust
/// use invsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// invsync_provider_azure::register(&registry);
/// assert!(registry.has_provider("azure"));
/// ```
pub fn register(registry: &invsync_core::ProviderRegistry) {
    registry.register_provider("azure", Box::new(AzureProviderFactory));
}
