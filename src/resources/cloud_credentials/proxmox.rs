//! Proxmox cloud credentials.
//!
//! The server keeps the public and the private network in one
//! `proxmoxNetworks` list, told apart by `isPrivate`; the schema exposes
//! each as a flat group of `public_*` and `private_*` attributes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    credential_schema, list_flattened, CloudCredentialKind, CommonDto, DASHBOARD_ROUTE,
    DELETE_ROUTE, LOCK_ROUTE,
};
use crate::attributes::AttributeBag;
use crate::client::{Routes, TaikunClient};
use crate::context::OperationContext;
use crate::convert::{IdKind, ResourceId};
use crate::error::ProviderError;
use crate::paging::Page;
use crate::resources::{organization_id, record, Family, FamilyInfo, ListFilter, Record};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_cloud_credential_proxmox",
    data_source_plural: "taikun_cloud_credentials_proxmox",
    list_attribute: "cloud_credentials",
    write_only: &["client_id", "client_secret"],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &["name", "client_id", "client_secret"],
};

static ROUTES: Routes = Routes {
    list: DASHBOARD_ROUTE,
    create: "/api/Proxmox/create",
    update: "/api/Proxmox/update",
    delete: DELETE_ROUTE,
    lock_manager: LOCK_ROUTE,
};

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct ProxmoxNetworkDto {
    network: String,
    netmask: i64,
    gateway: String,
    begin_allocation_range: String,
    end_allocation_range: String,
    bridge: String,
    is_private: bool,
}

impl ProxmoxNetworkDto {
    fn from_bag(bag: &AttributeBag, side: &str, is_private: bool) -> Self {
        let field = |name: &str| bag.string(&format!("{}_{}", side, name));
        Self {
            network: field("network"),
            netmask: bag.get_i64(&format!("{}_netmask", side)).unwrap_or(0),
            gateway: field("gateway"),
            begin_allocation_range: field("begin_allocation_range"),
            end_allocation_range: field("end_allocation_range"),
            bridge: field("bridge"),
            is_private,
        }
    }

    fn flatten(self, side: &str) -> Record {
        [
            ("network", Value::from(self.network)),
            ("netmask", Value::from(self.netmask)),
            ("gateway", Value::from(self.gateway)),
            ("begin_allocation_range", Value::from(self.begin_allocation_range)),
            ("end_allocation_range", Value::from(self.end_allocation_range)),
            ("bridge", Value::from(self.bridge)),
        ]
        .into_iter()
        .map(|(name, value)| (format!("{}_{}", side, name), value))
        .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProxmoxCredentialDto {
    #[serde(flatten)]
    common: CommonDto,
    url: String,
    storage: String,
    vm_template_name: String,
    hypervisors: Vec<String>,
    proxmox_networks: Vec<ProxmoxNetworkDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProxmoxCredential {
    name: String,
    url: String,
    client_id: String,
    client_secret: String,
    storage: String,
    vm_template_name: String,
    hypervisors: Vec<String>,
    proxmox_networks: Vec<ProxmoxNetworkDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProxmoxCredential<'a> {
    id: &'a ResourceId,
    name: String,
    client_id: String,
    client_secret: String,
}

/// Split the network list into (public, private), whatever its order.
fn split_networks(networks: Vec<ProxmoxNetworkDto>) -> (ProxmoxNetworkDto, ProxmoxNetworkDto) {
    let mut public = None;
    let mut private = None;
    for network in networks {
        let slot = if network.is_private {
            &mut private
        } else {
            &mut public
        };
        if slot.is_none() {
            *slot = Some(network);
        }
    }
    (public.unwrap_or_default(), private.unwrap_or_default())
}

fn network_schema(schema: Schema, side: &str, label: &str) -> Schema {
    let env = |name: &str| format!("PROXMOX_{}_{}", side.to_uppercase(), name);
    let attribute = |name: &str, description: String| {
        let variable = env(&name.to_uppercase());
        Attribute::required_string()
            .with_force_new()
            .with_env_default(&[variable.as_str()])
            .with_description(description)
    };
    schema
        .with_attribute(
            format!("{}_network", side),
            attribute("network", format!("The {} network address.", label))
                .with_validator(Validator::IpAddress),
        )
        .with_attribute(
            format!("{}_netmask", side),
            Attribute::new(AttributeType::Int64, AttributeFlags::required())
                .with_force_new()
                .with_env_default(&[env("NETMASK").as_str()])
                .with_validator(Validator::IntRange { min: 0, max: 32 })
                .with_description(format!("The {} network mask bits.", label)),
        )
        .with_attribute(
            format!("{}_gateway", side),
            attribute("gateway", format!("The {} network gateway.", label))
                .with_validator(Validator::IpAddress),
        )
        .with_attribute(
            format!("{}_begin_allocation_range", side),
            attribute(
                "begin_allocation_range",
                format!("First address of the {} allocation range.", label),
            )
            .with_validator(Validator::IpAddress),
        )
        .with_attribute(
            format!("{}_end_allocation_range", side),
            attribute(
                "end_allocation_range",
                format!("Last address of the {} allocation range.", label),
            )
            .with_validator(Validator::IpAddress),
        )
        .with_attribute(
            format!("{}_bridge", side),
            attribute("bridge", format!("The bridge of the {} network.", label)),
        )
}

/// A Proxmox VE cluster.
pub struct ProxmoxCredential;

#[async_trait]
impl Family for ProxmoxCredential {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        let schema = credential_schema("Proxmox", false)
            .with_attribute(
                "api_host",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["PROXMOX_API_HOST"])
                    .with_description("The Proxmox API host."),
            )
            .with_attribute(
                "client_id",
                Attribute::required_string()
                    .sensitive()
                    .with_env_default(&["PROXMOX_CLIENT_ID"])
                    .with_description("The Proxmox client ID."),
            )
            .with_attribute(
                "client_secret",
                Attribute::required_string()
                    .sensitive()
                    .with_env_default(&["PROXMOX_CLIENT_SECRET"])
                    .with_description("The Proxmox client secret."),
            )
            .with_attribute(
                "storage",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["PROXMOX_STORAGE"])
                    .with_description("The Proxmox storage."),
            )
            .with_attribute(
                "vm_template_name",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["PROXMOX_VM_TEMPLATE_NAME"])
                    .with_description("The Proxmox VM template name."),
            )
            .with_attribute(
                "hypervisors",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::required(),
                )
                .with_force_new()
                .with_description("The hypervisors of the Proxmox cluster."),
            );
        let schema = network_schema(schema, "public", "public");
        network_schema(schema, "private", "private")
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: ProxmoxCredentialDto = serde_json::from_value(dto)?;
        let (public, private) = split_networks(dto.proxmox_networks);
        let mut flattened = dto.common.flatten();
        flattened.extend(record(json!({
            "api_host": dto.url,
            "storage": dto.storage,
            "vm_template_name": dto.vm_template_name,
            "hypervisors": dto.hypervisors,
        })));
        flattened.extend(public.flatten("public"));
        flattened.extend(private.flatten("private"));
        Ok(flattened)
    }

    async fn list(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        filter: &ListFilter,
        offset: Option<i64>,
    ) -> Result<Page<Record>, ProviderError> {
        list_flattened(self, CloudCredentialKind::Proxmox, ctx, client, filter, offset).await
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = CreateProxmoxCredential {
            name: bag.string("name"),
            url: bag.string("api_host"),
            client_id: bag.string("client_id"),
            client_secret: bag.string("client_secret"),
            storage: bag.string("storage"),
            vm_template_name: bag.string("vm_template_name"),
            hypervisors: bag.get_string_list("hypervisors"),
            proxmox_networks: vec![
                ProxmoxNetworkDto::from_bag(bag, "public", false),
                ProxmoxNetworkDto::from_bag(bag, "private", true),
            ],
            organization_id: organization_id(bag)?,
        };
        client.create(ctx, ROUTES.create, &body).await
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        id: &ResourceId,
        bag: &AttributeBag,
    ) -> Result<(), ProviderError> {
        let body = UpdateProxmoxCredential {
            id,
            name: bag.string("name"),
            client_id: bag.string("client_id"),
            client_secret: bag.string("client_secret"),
        };
        client.update(ctx, ROUTES.update, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(address: &str, is_private: bool) -> Value {
        json!({
            "network": address,
            "netmask": 24,
            "gateway": "10.0.0.1",
            "beginAllocationRange": "10.0.0.10",
            "endAllocationRange": "10.0.0.20",
            "bridge": "vmbr0",
            "isPrivate": is_private
        })
    }

    #[test]
    fn test_networks_split_regardless_of_order() {
        for networks in [
            vec![network("192.168.1.0", true), network("10.0.0.0", false)],
            vec![network("10.0.0.0", false), network("192.168.1.0", true)],
        ] {
            let flattened = ProxmoxCredential
                .flatten(json!({"id": 3, "proxmoxNetworks": networks}))
                .unwrap();
            assert_eq!(flattened["public_network"], json!("10.0.0.0"));
            assert_eq!(flattened["private_network"], json!("192.168.1.0"));
            assert_eq!(flattened["private_netmask"], json!(24));
        }
    }

    #[test]
    fn test_missing_network_flattens_to_zero_values() {
        let flattened = ProxmoxCredential
            .flatten(json!({"proxmoxNetworks": [network("10.0.0.0", false)]}))
            .unwrap();
        assert_eq!(flattened["public_network"], json!("10.0.0.0"));
        assert_eq!(flattened["private_network"], json!(""));
        assert_eq!(flattened["private_netmask"], json!(0));
    }

    #[test]
    fn test_create_body_tags_networks() {
        let bag = AttributeBag::from_value(json!({
            "public_network": "10.0.0.0",
            "public_netmask": 24,
            "private_network": "192.168.1.0",
            "private_netmask": 16
        }))
        .unwrap();
        let networks = vec![
            ProxmoxNetworkDto::from_bag(&bag, "public", false),
            ProxmoxNetworkDto::from_bag(&bag, "private", true),
        ];
        let wire = serde_json::to_value(&networks).unwrap();
        assert_eq!(wire[0]["isPrivate"], json!(false));
        assert_eq!(wire[1]["network"], json!("192.168.1.0"));
        assert_eq!(wire[1]["netmask"], json!(16));
    }

    #[test]
    fn test_env_defaults_follow_side() {
        let schema = ProxmoxCredential.schema();
        assert_eq!(
            schema.attribute("private_bridge").unwrap().env_default,
            vec!["PROXMOX_PRIVATE_BRIDGE".to_string()]
        );
        assert_eq!(
            schema.attribute("public_netmask").unwrap().env_default,
            vec!["PROXMOX_PUBLIC_NETMASK".to_string()]
        );
    }
}
