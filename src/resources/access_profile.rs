//! Access profiles: SSH users, DNS and NTP servers, allowed hosts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    base_schema, id_string, item_i64, item_id, item_str, name_attribute, organization_id, record,
    with_audit, Family, FamilyInfo, Record,
};
use crate::attributes::AttributeBag;
use crate::client::{Routes, TaikunClient};
use crate::context::OperationContext;
use crate::convert::{IdKind, ResourceId};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_access_profile",
    data_source_plural: "taikun_access_profiles",
    list_attribute: "access_profiles",
    write_only: &[],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &["name", "ssh_user", "dns_server", "ntp_server", "allowed_host"],
};

static ROUTES: Routes = Routes {
    list: "/api/AccessProfiles/list",
    create: "/api/AccessProfiles/create",
    update: "/api/AccessProfiles/update",
    delete: "/api/AccessProfiles/delete",
    lock_manager: "/api/AccessProfiles/lockmanager",
};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct SshUserDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    name: String,
    ssh_public_key: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct ServerDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    address: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct AllowedHostDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    description: String,
    ip_address: String,
    mask_bits: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AccessProfileDto {
    id: Option<i64>,
    name: String,
    http_proxy: String,
    organization_id: Option<i64>,
    organization_name: String,
    is_locked: bool,
    created_by: String,
    last_modified: String,
    last_modified_by: String,
    ssh_users: Vec<SshUserDto>,
    dns_servers: Vec<ServerDto>,
    ntp_servers: Vec<ServerDto>,
    allowed_hosts: Vec<AllowedHostDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessProfileBody {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
    ssh_users: Vec<SshUserDto>,
    dns_servers: Vec<ServerDto>,
    ntp_servers: Vec<ServerDto>,
    allowed_hosts: Vec<AllowedHostDto>,
}

fn server_block(description: &str) -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("ID of the server."),
            )
            .with_attribute(
                "address",
                Attribute::required_string()
                    .with_validator(Validator::IpAddress)
                    .with_description("Address of the server."),
            )
            .with_description(description),
    )
}

fn servers(bag: &AttributeBag, name: &str) -> Vec<ServerDto> {
    bag.get_blocks(name)
        .into_iter()
        .map(|item| ServerDto {
            id: item_id(item).map(i64::from),
            address: item_str(item, "address"),
        })
        .collect()
}

fn flatten_servers(servers: Vec<ServerDto>) -> Vec<Value> {
    servers
        .into_iter()
        .map(|s| json!({"id": id_string(s.id), "address": s.address}))
        .collect()
}

impl AccessProfileBody {
    fn from_bag(bag: &AttributeBag) -> Result<Self, ProviderError> {
        Ok(Self {
            name: bag.string("name"),
            http_proxy: bag.get_str("http_proxy").map(str::to_string),
            organization_id: organization_id(bag)?,
            ssh_users: bag
                .get_blocks("ssh_user")
                .into_iter()
                .map(|item| SshUserDto {
                    id: item_id(item).map(i64::from),
                    name: item_str(item, "name"),
                    ssh_public_key: item_str(item, "public_key"),
                })
                .collect(),
            dns_servers: servers(bag, "dns_server"),
            ntp_servers: servers(bag, "ntp_server"),
            allowed_hosts: bag
                .get_blocks("allowed_host")
                .into_iter()
                .map(|item| AllowedHostDto {
                    id: item_id(item).map(i64::from),
                    description: item_str(item, "description"),
                    ip_address: item_str(item, "address"),
                    mask_bits: item_i64(item, "mask_bits").unwrap_or(32),
                })
                .collect(),
        })
    }
}

/// Access settings applied to the machines of a project.
pub struct AccessProfile;

#[async_trait]
impl Family for AccessProfile {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        with_audit(base_schema("Indicates whether to lock the access profile."))
            .with_attribute("name", name_attribute("The name of the access profile."))
            .with_attribute(
                "http_proxy",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("HTTP proxy of the access profile."),
            )
            .with_block(
                "ssh_user",
                NestedBlock::list(
                    Block::new()
                        .with_attribute(
                            "id",
                            Attribute::computed_string().with_description("ID of the SSH user."),
                        )
                        .with_attribute(
                            "name",
                            Attribute::required_string()
                                .with_validator(Validator::StringLength { min: 3, max: 30 })
                                .with_description("Name of the SSH user."),
                        )
                        .with_attribute(
                            "public_key",
                            Attribute::required_string()
                                .with_description("Public key of the SSH user."),
                        )
                        .with_description("List of SSH users."),
                ),
            )
            .with_block("dns_server", server_block("List of DNS servers."))
            .with_block("ntp_server", server_block("List of NTP servers."))
            .with_block(
                "allowed_host",
                NestedBlock::list(
                    Block::new()
                        .with_attribute(
                            "id",
                            Attribute::computed_string().with_description("ID of the host."),
                        )
                        .with_attribute(
                            "description",
                            Attribute::optional_string()
                                .with_description("Description of the host."),
                        )
                        .with_attribute(
                            "address",
                            Attribute::required_string()
                                .with_validator(Validator::IpAddress)
                                .with_description("IPv4 address of the host."),
                        )
                        .with_attribute(
                            "mask_bits",
                            Attribute::required_int64()
                                .with_validator(Validator::IntRange { min: 0, max: 32 })
                                .with_description("Number of mask bits of the IPv4 address."),
                        )
                        .with_description("List of hosts allowed to reach the cluster."),
                ),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: AccessProfileDto = serde_json::from_value(dto)?;
        let ssh_users: Vec<Value> = dto
            .ssh_users
            .into_iter()
            .map(|u| json!({"id": id_string(u.id), "name": u.name, "public_key": u.ssh_public_key}))
            .collect();
        let allowed_hosts: Vec<Value> = dto
            .allowed_hosts
            .into_iter()
            .map(|h| {
                json!({
                    "id": id_string(h.id),
                    "description": h.description,
                    "address": h.ip_address,
                    "mask_bits": h.mask_bits,
                })
            })
            .collect();
        Ok(record(json!({
            "id": id_string(dto.id),
            "name": dto.name,
            "http_proxy": dto.http_proxy,
            "organization_id": id_string(dto.organization_id),
            "organization_name": dto.organization_name,
            "lock": dto.is_locked,
            "created_by": dto.created_by,
            "last_modified": dto.last_modified,
            "last_modified_by": dto.last_modified_by,
            "ssh_user": ssh_users,
            "dns_server": flatten_servers(dto.dns_servers),
            "ntp_server": flatten_servers(dto.ntp_servers),
            "allowed_host": allowed_hosts,
        })))
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = AccessProfileBody::from_bag(bag)?;
        client.create(ctx, ROUTES.create, &body).await
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        id: &ResourceId,
        bag: &AttributeBag,
    ) -> Result<(), ProviderError> {
        let mut body = AccessProfileBody::from_bag(bag)?;
        body.http_proxy = None;
        body.organization_id = None;
        let route = format!("{}/{}", ROUTES.update, id);
        client.update(ctx, &route, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag() -> AttributeBag {
        AttributeBag::from_value(json!({
            "name": "access-a",
            "http_proxy": "http://proxy:3128",
            "ssh_user": [{"id": "", "name": "ops", "public_key": "ssh-ed25519 AAAA"}],
            "dns_server": [{"address": "8.8.8.8"}],
            "ntp_server": [{"id": "4", "address": "10.0.0.4"}],
            "allowed_host": [{"description": "vpn", "address": "10.1.0.0", "mask_bits": 16}]
        }))
        .unwrap()
    }

    #[test]
    fn test_body_inflates_blocks() {
        let body = serde_json::to_value(AccessProfileBody::from_bag(&bag()).unwrap()).unwrap();
        assert_eq!(body["sshUsers"][0]["sshPublicKey"], json!("ssh-ed25519 AAAA"));
        assert!(body["sshUsers"][0].get("id").is_none());
        assert_eq!(body["ntpServers"][0]["id"], json!(4));
        assert_eq!(body["allowedHosts"][0]["ipAddress"], json!("10.1.0.0"));
        assert_eq!(body["allowedHosts"][0]["maskBits"], json!(16));
        assert_eq!(body["httpProxy"], json!("http://proxy:3128"));
    }

    #[test]
    fn test_flatten_round_trips_blocks() {
        let body = serde_json::to_value(AccessProfileBody::from_bag(&bag()).unwrap()).unwrap();
        let flattened = AccessProfile.flatten(body).unwrap();
        assert_eq!(flattened["name"], json!("access-a"));
        assert_eq!(flattened["ssh_user"][0]["public_key"], json!("ssh-ed25519 AAAA"));
        assert_eq!(flattened["dns_server"][0]["address"], json!("8.8.8.8"));
        assert_eq!(flattened["ntp_server"][0]["id"], json!("4"));
        assert_eq!(flattened["allowed_host"][0]["mask_bits"], json!(16));
    }

    #[test]
    fn test_dns_address_must_be_ip() {
        let diagnostics = crate::validation::validate(
            &AccessProfile.schema(),
            &json!({"name": "access-a", "dns_server": [{"address": "dns.example.com"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("dns_server.0.address".to_string())
        );
    }
}
