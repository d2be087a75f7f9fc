//! Authenticated ARM session bound to one subscription

use async_trait::async_trait;
use invsync_core::resources::{Network, NetworkInterface, SecurityGroup, VirtualMachine};
use invsync_core::traits::ProviderSession;
use invsync_core::{Error, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{ArmClient, ArmError, COMPUTE_API_VERSION, NETWORK_API_VERSION, PROVIDER};
use crate::wire::{
    ArmNetworkInterface, ArmSecurityGroup, ArmVirtualMachine, ArmVirtualNetwork,
};

#[derive(Debug)]
pub struct AzureSession {
    client: ArmClient,
    subscription_id: String,
}

impl AzureSession {
    pub(crate) fn new(client: ArmClient, subscription_id: impl Into<String>) -> Self {
        Self {
            client,
            subscription_id: subscription_id.into(),
        }
    }

    fn subscription_path(&self, provider_path: &str) -> String {
        format!(
            "/subscriptions/{}/providers/{}",
            self.subscription_id, provider_path
        )
    }

    /// Full VM model plus the instance view, which carries the power state
    fn virtual_machines_url(&self) -> String {
        self.client.url(
            &self.subscription_path("Microsoft.Compute/virtualMachines?$expand=instanceView"),
            COMPUTE_API_VERSION,
        )
    }

    fn resource_url(&self, id: &str) -> Result<String> {
        if !id.starts_with('/') {
            return Err(Error::invalid_input(format!(
                "Not a full Azure resource id: {}",
                id
            )));
        }
        Ok(self.client.url(id, NETWORK_API_VERSION))
    }
}

fn fetch_error(resource: &str) -> impl FnOnce(ArmError) -> Error + '_ {
    move |e| Error::fetch(resource, Error::from(e).to_string())
}

#[async_trait]
impl ProviderSession for AzureSession {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        let url = self.client.url(
            &self.subscription_path("Microsoft.Network/virtualNetworks"),
            NETWORK_API_VERSION,
        );
        let raw: Vec<ArmVirtualNetwork> = self
            .client
            .get_all_pages(&url)
            .await
            .map_err(fetch_error("networks"))?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>> {
        let url = self.virtual_machines_url();
        let raw: Vec<ArmVirtualMachine> = self
            .client
            .get_all_pages(&url)
            .await
            .map_err(fetch_error("virtual machines"))?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        let url = self.client.url(
            &self.subscription_path("Microsoft.Network/networkSecurityGroups"),
            NETWORK_API_VERSION,
        );
        let raw: Vec<ArmSecurityGroup> = self
            .client
            .get_all_pages(&url)
            .await
            .map_err(fetch_error("security groups"))?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn list_network_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let url = self.client.url(
            &self.subscription_path("Microsoft.Network/networkInterfaces"),
            NETWORK_API_VERSION,
        );
        let raw: Vec<ArmNetworkInterface> = self
            .client
            .get_all_pages(&url)
            .await
            .map_err(fetch_error("network interfaces"))?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup> {
        let url = self.resource_url(id)?;
        let raw: ArmSecurityGroup = self.client.get_json(&url).await.map_err(Error::from)?;
        Ok(raw.into())
    }

    /// Read-modify-write of the network interface resource
    ///
    /// ARM PUT replaces the whole resource, so the current document is read
    /// first and only `properties.networkSecurityGroup` is changed.
    async fn set_network_interface_security_group(
        &self,
        network_interface_id: &str,
        security_group_id: Option<&str>,
    ) -> Result<()> {
        let url = self.resource_url(network_interface_id)?;
        let mut nic: Value = self.client.get_json(&url).await.map_err(Error::from)?;

        let properties = nic
            .get_mut("properties")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                Error::provider(PROVIDER, "Invalid response format: properties is not an object")
            })?;

        match security_group_id {
            Some(group_id) => {
                properties.insert(
                    "networkSecurityGroup".to_string(),
                    serde_json::json!({ "id": group_id }),
                );
            }
            None => {
                properties.remove("networkSecurityGroup");
            }
        }

        debug!(network_interface_id, "Updating network interface");
        let _: Value = self.client.put_json(&url, &nic).await.map_err(Error::from)?;

        info!(
            network_interface_id,
            security_group_id = security_group_id.unwrap_or("<none>"),
            "Network interface security group updated"
        );
        Ok(())
    }
}
