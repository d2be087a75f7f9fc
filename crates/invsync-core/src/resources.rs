//! Provider-neutral resource model
//!
//! Providers normalize their wire objects into these types. The `serde`
//! projection of each type is the JSON that gets persisted and published, so
//! field names here are part of the downstream contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag key that marks a security group as managed by the platform
pub const MANAGED_TAG_KEY: &str = "ExtremePolicyId";

/// Resource tags, projected as `[{"key": .., "value": ..}]`
pub type Tags = BTreeMap<String, String>;

/// True when the tag set carries the managed sentinel key, whatever its value
pub fn is_managed(tags: &Tags) -> bool {
    tags.contains_key(MANAGED_TAG_KEY)
}

/// Case-insensitive exact match of a resource group against an optional filter
///
/// A missing or empty filter matches every group.
pub fn in_resource_group(resource_group: &str, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(f) if f.is_empty() => true,
        Some(f) => resource_group.to_lowercase() == f.to_lowercase(),
    }
}

mod tag_list {
    use super::Tags;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct TagEntry {
        key: String,
        value: String,
    }

    pub fn serialize<S: Serializer>(tags: &Tags, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(tags.len()))?;
        for (key, value) in tags {
            seq.serialize_element(&TagEntry {
                key: key.clone(),
                value: value.clone(),
            })?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tags, D::Error> {
        let entries = Vec::<TagEntry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
    }
}

/// A virtual network and its subnets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub region_name: String,
    pub resource_group_name: String,
    pub address_prefixes: Vec<String>,
    pub subnets: Vec<Subnet>,
    #[serde(with = "tag_list")]
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subnet {
    pub name: String,
    pub address_prefix: Option<String>,
    pub network_security_group_id: Option<String>,
    pub route_table_id: Option<String>,
    pub ip_configuration_count: usize,
}

/// A virtual machine with its instance-view power state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualMachine {
    pub id: String,
    pub vm_id: Option<String>,
    pub name: String,
    pub computer_name: Option<String>,
    pub availability_set_id: Option<String>,
    pub primary_network_interface_id: Option<String>,
    pub provisioning_state: Option<String>,
    pub power_state: Option<String>,
    pub region_name: String,
    pub resource_group_name: String,
    pub size: Option<String>,
    /// Operating system family, e.g. `Linux`
    pub device_family: Option<String>,
    /// Image offer and SKU, e.g. `UbuntuServer 18.04-LTS`
    pub device_type: Option<String>,
    pub availability_zones: Vec<String>,
    #[serde(rename = "networkInterfaceIDs")]
    pub network_interface_ids: Vec<String>,
    #[serde(with = "tag_list")]
    pub tags: Tags,
}

/// A network security group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub region_name: String,
    pub resource_group_name: String,
    pub default_security_rules: Vec<SecurityRule>,
    pub security_rules: Vec<SecurityRule>,
    pub network_interface_ids: Vec<String>,
    #[serde(with = "tag_list")]
    pub tags: Tags,
}

impl SecurityGroup {
    pub fn is_managed(&self) -> bool {
        is_managed(&self.tags)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityRule {
    pub name: String,
    pub description: Option<String>,
    pub protocol: Option<String>,
    pub access: Option<String>,
    pub direction: Option<String>,
    pub priority: Option<i32>,
    pub source_address_prefix: Option<String>,
    pub source_port_range: Option<String>,
    pub destination_address_prefix: Option<String>,
    pub destination_port_range: Option<String>,
    pub source_application_security_group_ids: Vec<String>,
    pub destination_application_security_group_ids: Vec<String>,
}

/// A network interface card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkInterface {
    pub id: String,
    pub name: String,
    pub mac_address: Option<String>,
    pub region_name: String,
    pub resource_group_name: String,
    pub virtual_machine_id: Option<String>,
    pub network_security_group_id: Option<String>,
    #[serde(rename = "primaryPrivateIP")]
    pub primary_private_ip: Option<String>,
    pub internal_dns_name_label: Option<String>,
    pub internal_domain_name_suffix: Option<String>,
    pub internal_fqdn: Option<String>,
    #[serde(rename = "IpConfigurations")]
    pub ip_configurations: Vec<IpConfiguration>,
    #[serde(with = "tag_list")]
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IpConfiguration {
    pub name: String,
    /// Id of the virtual network the configuration's subnet belongs to
    pub network_id: Option<String>,
    pub subnet_name: Option<String>,
    pub private_ip_address: Option<String>,
    pub public_ip_address_id: Option<String>,
    pub is_primary: bool,
}
