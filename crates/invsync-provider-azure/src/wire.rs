//! ARM response shapes and their conversion into inventory records
//!
//! Only the fields the inventory carries are modelled; everything else in
//! the ARM payload is ignored.

use invsync_core::resources::{
    IpConfiguration, Network, NetworkInterface, SecurityGroup, SecurityRule, Subnet, Tags,
    VirtualMachine,
};
use serde::Deserialize;

/// One page of an ARM collection
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct ArmList<T> {
    #[serde(default)]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SubResource {
    pub id: String,
}

fn ids(refs: Vec<SubResource>) -> Vec<String> {
    refs.into_iter().map(|r| r.id).collect()
}

/// Resource group segment of an ARM id
pub(crate) fn resource_group_of(id: &str) -> String {
    let mut segments = id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next().unwrap_or_default().to_string();
        }
    }
    String::new()
}

/// Split a subnet id into its virtual network id and subnet name
pub(crate) fn split_subnet_id(subnet_id: &str) -> Option<(String, String)> {
    let (network, name) = subnet_id.rsplit_once('/')?;
    let network = network.strip_suffix("/subnets")?;
    Some((network.to_string(), name.to_string()))
}

fn tags(tags: Option<Tags>) -> Tags {
    tags.unwrap_or_default()
}

// Virtual networks

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArmVirtualNetwork {
    pub id: String,
    pub name: String,
    pub location: String,
    pub tags: Option<Tags>,
    pub properties: VirtualNetworkProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct VirtualNetworkProperties {
    pub address_space: AddressSpace,
    pub subnets: Vec<ArmSubnet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct AddressSpace {
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArmSubnet {
    pub name: String,
    pub properties: SubnetProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct SubnetProperties {
    pub address_prefix: Option<String>,
    pub network_security_group: Option<SubResource>,
    pub route_table: Option<SubResource>,
    pub ip_configurations: Vec<SubResource>,
}

impl From<ArmVirtualNetwork> for Network {
    fn from(vnet: ArmVirtualNetwork) -> Self {
        Network {
            resource_group_name: resource_group_of(&vnet.id),
            id: vnet.id,
            name: vnet.name,
            region_name: vnet.location,
            address_prefixes: vnet.properties.address_space.address_prefixes,
            subnets: vnet
                .properties
                .subnets
                .into_iter()
                .map(|s| Subnet {
                    name: s.name,
                    address_prefix: s.properties.address_prefix,
                    network_security_group_id: s.properties.network_security_group.map(|r| r.id),
                    route_table_id: s.properties.route_table.map(|r| r.id),
                    ip_configuration_count: s.properties.ip_configurations.len(),
                })
                .collect(),
            tags: tags(vnet.tags),
        }
    }
}

// Virtual machines

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArmVirtualMachine {
    pub id: String,
    pub name: String,
    pub location: String,
    pub tags: Option<Tags>,
    pub zones: Vec<String>,
    pub properties: VirtualMachineProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct VirtualMachineProperties {
    pub vm_id: Option<String>,
    pub provisioning_state: Option<String>,
    pub availability_set: Option<SubResource>,
    pub hardware_profile: HardwareProfile,
    pub storage_profile: StorageProfile,
    pub os_profile: OsProfile,
    pub network_profile: NetworkProfile,
    pub instance_view: Option<InstanceView>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct HardwareProfile {
    pub vm_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct StorageProfile {
    pub image_reference: Option<ImageReference>,
    pub os_disk: Option<OsDisk>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ImageReference {
    pub offer: Option<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct OsDisk {
    pub os_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct OsProfile {
    pub computer_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NetworkProfile {
    pub network_interfaces: Vec<NetworkInterfaceReference>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct NetworkInterfaceReference {
    pub id: String,
    pub properties: Option<NetworkInterfaceReferenceProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct NetworkInterfaceReferenceProperties {
    pub primary: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct InstanceView {
    pub statuses: Vec<InstanceViewStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct InstanceViewStatus {
    pub code: String,
}

impl From<ArmVirtualMachine> for VirtualMachine {
    fn from(vm: ArmVirtualMachine) -> Self {
        let props = vm.properties;

        let power_state = props.instance_view.and_then(|view| {
            view.statuses
                .into_iter()
                .map(|s| s.code)
                .find(|code| code.starts_with("PowerState/"))
        });

        let device_type = props.storage_profile.image_reference.and_then(|image| {
            match (image.offer, image.sku) {
                (Some(offer), Some(sku)) => Some(format!("{} {}", offer, sku)),
                (Some(only), None) | (None, Some(only)) => Some(only),
                (None, None) => None,
            }
        });

        let nics = props.network_profile.network_interfaces;
        // A single attached NIC is primary even without the flag
        let primary_network_interface_id = nics
            .iter()
            .find(|n| n.properties.as_ref().and_then(|p| p.primary) == Some(true))
            .or_else(|| if nics.len() == 1 { nics.first() } else { None })
            .map(|n| n.id.clone());

        VirtualMachine {
            resource_group_name: resource_group_of(&vm.id),
            id: vm.id,
            vm_id: props.vm_id,
            name: vm.name,
            computer_name: props.os_profile.computer_name,
            availability_set_id: props.availability_set.map(|r| r.id),
            primary_network_interface_id,
            provisioning_state: props.provisioning_state,
            power_state,
            region_name: vm.location,
            size: props.hardware_profile.vm_size,
            device_family: props.storage_profile.os_disk.and_then(|d| d.os_type),
            device_type,
            availability_zones: vm.zones,
            network_interface_ids: nics.into_iter().map(|n| n.id).collect(),
            tags: tags(vm.tags),
        }
    }
}

// Network security groups

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArmSecurityGroup {
    pub id: String,
    pub name: String,
    pub location: String,
    pub tags: Option<Tags>,
    pub properties: SecurityGroupProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct SecurityGroupProperties {
    pub security_rules: Vec<ArmSecurityRule>,
    pub default_security_rules: Vec<ArmSecurityRule>,
    pub network_interfaces: Vec<SubResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArmSecurityRule {
    pub name: String,
    pub properties: SecurityRuleProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct SecurityRuleProperties {
    pub description: Option<String>,
    pub protocol: Option<String>,
    pub access: Option<String>,
    pub direction: Option<String>,
    pub priority: Option<i32>,
    pub source_address_prefix: Option<String>,
    pub source_port_range: Option<String>,
    pub destination_address_prefix: Option<String>,
    pub destination_port_range: Option<String>,
    pub source_application_security_groups: Vec<SubResource>,
    pub destination_application_security_groups: Vec<SubResource>,
}

impl From<ArmSecurityRule> for SecurityRule {
    fn from(rule: ArmSecurityRule) -> Self {
        let p = rule.properties;
        SecurityRule {
            name: rule.name,
            description: p.description,
            protocol: p.protocol,
            access: p.access,
            direction: p.direction,
            priority: p.priority,
            source_address_prefix: p.source_address_prefix,
            source_port_range: p.source_port_range,
            destination_address_prefix: p.destination_address_prefix,
            destination_port_range: p.destination_port_range,
            source_application_security_group_ids: ids(p.source_application_security_groups),
            destination_application_security_group_ids: ids(
                p.destination_application_security_groups,
            ),
        }
    }
}

impl From<ArmSecurityGroup> for SecurityGroup {
    fn from(nsg: ArmSecurityGroup) -> Self {
        let p = nsg.properties;
        SecurityGroup {
            resource_group_name: resource_group_of(&nsg.id),
            id: nsg.id,
            name: nsg.name,
            region_name: nsg.location,
            default_security_rules: p.default_security_rules.into_iter().map(Into::into).collect(),
            security_rules: p.security_rules.into_iter().map(Into::into).collect(),
            network_interface_ids: ids(p.network_interfaces),
            tags: tags(nsg.tags),
        }
    }
}

// Network interfaces

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArmNetworkInterface {
    pub id: String,
    pub name: String,
    pub location: String,
    pub tags: Option<Tags>,
    pub properties: NetworkInterfaceProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NetworkInterfaceProperties {
    pub mac_address: Option<String>,
    pub virtual_machine: Option<SubResource>,
    pub network_security_group: Option<SubResource>,
    pub dns_settings: Option<DnsSettings>,
    pub ip_configurations: Vec<ArmIpConfiguration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct DnsSettings {
    pub internal_dns_name_label: Option<String>,
    pub internal_domain_name_suffix: Option<String>,
    pub internal_fqdn: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArmIpConfiguration {
    pub name: String,
    pub properties: IpConfigurationProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct IpConfigurationProperties {
    #[serde(rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    pub primary: Option<bool>,
    pub subnet: Option<SubResource>,
    #[serde(rename = "publicIPAddress")]
    pub public_ip_address: Option<SubResource>,
}

impl From<ArmIpConfiguration> for IpConfiguration {
    fn from(config: ArmIpConfiguration) -> Self {
        let p = config.properties;
        let (network_id, subnet_name) = p
            .subnet
            .as_ref()
            .and_then(|s| split_subnet_id(&s.id))
            .map_or((None, None), |(network, subnet)| (Some(network), Some(subnet)));

        IpConfiguration {
            name: config.name,
            network_id,
            subnet_name,
            private_ip_address: p.private_ip_address,
            public_ip_address_id: p.public_ip_address.map(|r| r.id),
            is_primary: p.primary.unwrap_or(false),
        }
    }
}

impl From<ArmNetworkInterface> for NetworkInterface {
    fn from(nic: ArmNetworkInterface) -> Self {
        let p = nic.properties;
        let dns = p.dns_settings.unwrap_or_default();
        let ip_configurations: Vec<IpConfiguration> =
            p.ip_configurations.into_iter().map(Into::into).collect();

        let primary_private_ip = ip_configurations
            .iter()
            .find(|c| c.is_primary)
            .or_else(|| ip_configurations.first())
            .and_then(|c| c.private_ip_address.clone());

        NetworkInterface {
            resource_group_name: resource_group_of(&nic.id),
            id: nic.id,
            name: nic.name,
            mac_address: p.mac_address,
            region_name: nic.location,
            virtual_machine_id: p.virtual_machine.map(|r| r.id),
            network_security_group_id: p.network_security_group.map(|r| r.id),
            primary_private_ip,
            internal_dns_name_label: dns.internal_dns_name_label,
            internal_domain_name_suffix: dns.internal_domain_name_suffix,
            internal_fqdn: dns.internal_fqdn,
            ip_configurations,
            tags: tags(nic.tags),
        }
    }
}
