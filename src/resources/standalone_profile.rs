//! Standalone VM profiles: an SSH key plus security group rules.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    base_schema, id_string, item_i64, item_str, name_attribute, organization_id, record, Family,
    FamilyInfo, Record,
};
use crate::attributes::AttributeBag;
use crate::client::{Routes, TaikunClient};
use crate::context::OperationContext;
use crate::convert::{IdKind, ResourceId};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_standalone_profile",
    data_source_plural: "taikun_standalone_profiles",
    list_attribute: "standalone_profiles",
    write_only: &[],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &["name"],
};

static ROUTES: Routes = Routes {
    list: "/api/StandaloneProfile/list",
    create: "/api/StandaloneProfile/create",
    update: "/api/StandaloneProfile/edit",
    delete: "/api/StandaloneProfile/delete",
    lock_manager: "/api/StandaloneProfile/lockmanager",
};

const PROTOCOLS: &[&str] = &["TCP", "UDP", "ICMP"];

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct SecurityGroupDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    name: String,
    protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_min_range: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_max_range: Option<i64>,
    remote_ip_prefix: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StandaloneProfileDto {
    id: Option<i64>,
    name: String,
    public_key: String,
    organization_id: Option<i64>,
    organization_name: String,
    is_locked: bool,
    security_groups: Vec<SecurityGroupDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateStandaloneProfile {
    name: String,
    public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
    security_groups: Vec<SecurityGroupDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EditStandaloneProfile<'a> {
    id: &'a ResourceId,
    name: String,
}

/// SSH key and firewall rules for standalone VMs.
pub struct StandaloneProfile;

#[async_trait]
impl Family for StandaloneProfile {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        let port = |description: &str| {
            Attribute::optional_int64()
                .with_validator(Validator::IntRange { min: 0, max: 65535 })
                .with_description(description)
        };
        base_schema("Indicates whether to lock the standalone profile.")
            .with_attribute("name", name_attribute("The name of the standalone profile."))
            .with_attribute(
                "public_key",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The public SSH key of the standalone profile."),
            )
            .with_block(
                "security_group",
                NestedBlock::list(
                    Block::new()
                        .with_attribute(
                            "id",
                            Attribute::computed_string()
                                .with_description("The ID of the security group."),
                        )
                        .with_attribute(
                            "name",
                            Attribute::required_string()
                                .with_validator(Validator::StringLength { min: 3, max: 30 })
                                .with_description("The name of the security group."),
                        )
                        .with_attribute(
                            "protocol",
                            Attribute::required_string()
                                .with_validator(Validator::one_of(PROTOCOLS))
                                .with_description("The protocol: TCP, UDP or ICMP."),
                        )
                        .with_attribute("port_min_range", port("The minimum port of the range."))
                        .with_attribute("port_max_range", port("The maximum port of the range."))
                        .with_attribute(
                            "remote_ip_prefix",
                            Attribute::required_string()
                                .with_validator(Validator::Cidr)
                                .with_description("Remote IP prefix in CIDR notation."),
                        )
                        .with_description("List of security groups."),
                )
                .with_force_new(),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: StandaloneProfileDto = serde_json::from_value(dto)?;
        let groups: Vec<Value> = dto
            .security_groups
            .into_iter()
            .map(|g| {
                json!({
                    "id": id_string(g.id),
                    "name": g.name,
                    "protocol": g.protocol.to_uppercase(),
                    "port_min_range": g.port_min_range.unwrap_or(0),
                    "port_max_range": g.port_max_range.unwrap_or(0),
                    "remote_ip_prefix": g.remote_ip_prefix,
                })
            })
            .collect();
        Ok(record(json!({
            "id": id_string(dto.id),
            "name": dto.name,
            "public_key": dto.public_key,
            "organization_id": id_string(dto.organization_id),
            "organization_name": dto.organization_name,
            "lock": dto.is_locked,
            "security_group": groups,
        })))
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = CreateStandaloneProfile {
            name: bag.string("name"),
            public_key: bag.string("public_key"),
            organization_id: organization_id(bag)?,
            security_groups: bag
                .get_blocks("security_group")
                .into_iter()
                .map(|item| SecurityGroupDto {
                    id: None,
                    name: item_str(item, "name"),
                    protocol: item_str(item, "protocol"),
                    port_min_range: item_i64(item, "port_min_range"),
                    port_max_range: item_i64(item, "port_max_range"),
                    remote_ip_prefix: item_str(item, "remote_ip_prefix"),
                })
                .collect(),
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
        let body = EditStandaloneProfile {
            id,
            name: bag.string("name"),
        };
        client.update(ctx, ROUTES.update, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_security_groups() {
        let flattened = StandaloneProfile
            .flatten(json!({
                "id": 5,
                "name": "standalone",
                "publicKey": "ssh-rsa AAAA",
                "securityGroups": [{
                    "id": 8,
                    "name": "ssh",
                    "protocol": "tcp",
                    "portMinRange": 22,
                    "portMaxRange": 22,
                    "remoteIpPrefix": "0.0.0.0/0"
                }]
            }))
            .unwrap();
        let group = &flattened["security_group"][0];
        assert_eq!(group["id"], json!("8"));
        assert_eq!(group["protocol"], json!("TCP"));
        assert_eq!(group["port_min_range"], json!(22));
        assert_eq!(group["remote_ip_prefix"], json!("0.0.0.0/0"));
    }

    #[test]
    fn test_only_name_is_updated_in_place() {
        assert_eq!(StandaloneProfile.schema().updatable(), vec!["lock", "name"]);
    }

    #[test]
    fn test_edit_body_shape() {
        let id = ResourceId::Numeric(5);
        let body = EditStandaloneProfile {
            id: &id,
            name: "renamed".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"id": 5, "name": "renamed"})
        );
    }
}
