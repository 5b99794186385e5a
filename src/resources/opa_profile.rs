//! OPA (policy) profiles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{base_schema, id_string, organization_id, record, Family, FamilyInfo, Record};
use crate::attributes::AttributeBag;
use crate::client::{Routes, TaikunClient};
use crate::context::OperationContext;
use crate::convert::{IdKind, ResourceId};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_opa_profile",
    data_source_plural: "taikun_opa_profiles",
    list_attribute: "opa_profiles",
    write_only: &[],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &[
        "name",
        "allowed_repos",
        "forbid_http_ingress",
        "forbid_node_port",
        "ingress_whitelist",
        "require_probe",
        "unique_ingress",
        "unique_service_selector",
    ],
};

static ROUTES: Routes = Routes {
    list: "/api/OpaProfiles/list",
    create: "/api/OpaProfiles/create",
    update: "/api/OpaProfiles/update",
    delete: "/api/OpaProfiles/delete",
    lock_manager: "/api/OpaProfiles/lockmanager",
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OpaProfileDto {
    id: Option<i64>,
    name: String,
    allowed_repo: Vec<String>,
    forbid_http_ingress: bool,
    forbid_node_port: bool,
    ingress_whitelist: Vec<String>,
    require_probe: bool,
    unique_ingresses: bool,
    unique_service_selector: bool,
    organization_id: Option<i64>,
    organization_name: String,
    is_locked: bool,
    is_default: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpaProfileBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<ResourceId>,
    name: String,
    allowed_repo: Vec<String>,
    forbid_http_ingress: bool,
    forbid_node_port: bool,
    ingress_whitelist: Vec<String>,
    require_probe: bool,
    unique_ingresses: bool,
    unique_service_selector: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

impl OpaProfileBody {
    fn from_bag(bag: &AttributeBag) -> Self {
        Self {
            id: None,
            name: bag.string("name"),
            allowed_repo: bag.get_string_list("allowed_repos"),
            forbid_http_ingress: bag.get_bool("forbid_http_ingress"),
            forbid_node_port: bag.get_bool("forbid_node_port"),
            ingress_whitelist: bag.get_string_list("ingress_whitelist"),
            require_probe: bag.get_bool("require_probe"),
            unique_ingresses: bag.get_bool("unique_ingress"),
            unique_service_selector: bag.get_bool("unique_service_selector"),
            organization_id: None,
        }
    }
}

fn policy_flag(description: &str) -> Attribute {
    Attribute::optional_bool()
        .with_default(json!(false))
        .with_description(description)
}

fn string_set(description: &str) -> Attribute {
    Attribute::new(
        AttributeType::set(AttributeType::String),
        AttributeFlags::optional(),
    )
    .with_description(description)
}

/// Policy settings enforced by Open Policy Agent.
pub struct OpaProfile;

#[async_trait]
impl Family for OpaProfile {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        base_schema("Indicates whether to lock the OPA profile.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::StringLength { min: 3, max: 50 })
                    .with_validator(Validator::name_pattern())
                    .with_description("The name of the OPA profile."),
            )
            .with_attribute(
                "allowed_repos",
                string_set(
                    "Requires container images to begin with a string from the specified list.",
                ),
            )
            .with_attribute(
                "forbid_http_ingress",
                policy_flag("Requires Ingress resources to be HTTPS only."),
            )
            .with_attribute(
                "forbid_node_port",
                policy_flag("Disallows all Services with type NodePort."),
            )
            .with_attribute(
                "ingress_whitelist",
                string_set("List of allowed Ingress rule hosts."),
            )
            .with_attribute(
                "require_probe",
                policy_flag("Requires Pods to have readiness and liveness probes."),
            )
            .with_attribute(
                "unique_ingress",
                policy_flag("Requires all Ingress rule hosts to be unique."),
            )
            .with_attribute(
                "unique_service_selector",
                policy_flag("Whether to allow only one service per application."),
            )
            .with_attribute(
                "is_default",
                Attribute::computed_bool()
                    .with_description("Indicates whether the OPA profile is the default one."),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: OpaProfileDto = serde_json::from_value(dto)?;
        Ok(record(json!({
            "id": id_string(dto.id),
            "name": dto.name,
            "allowed_repos": dto.allowed_repo,
            "forbid_http_ingress": dto.forbid_http_ingress,
            "forbid_node_port": dto.forbid_node_port,
            "ingress_whitelist": dto.ingress_whitelist,
            "require_probe": dto.require_probe,
            "unique_ingress": dto.unique_ingresses,
            "unique_service_selector": dto.unique_service_selector,
            "organization_id": id_string(dto.organization_id),
            "organization_name": dto.organization_name,
            "lock": dto.is_locked,
            "is_default": dto.is_default,
        })))
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = OpaProfileBody {
            organization_id: organization_id(bag)?,
            ..OpaProfileBody::from_bag(bag)
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
        let body = OpaProfileBody {
            id: Some(*id),
            ..OpaProfileBody::from_bag(bag)
        };
        client.update(ctx, ROUTES.update, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_of_policy_fields() {
        let bag = AttributeBag::from_value(json!({
            "name": "strict-policies",
            "allowed_repos": ["registry.example.com/"],
            "forbid_node_port": true,
            "unique_ingress": true
        }))
        .unwrap();
        let wire = serde_json::to_value(OpaProfileBody::from_bag(&bag)).unwrap();
        assert_eq!(wire["uniqueIngresses"], json!(true));
        assert!(wire.get("id").is_none());

        let flattened = OpaProfile.flatten(wire).unwrap();
        assert_eq!(flattened["allowed_repos"], json!(["registry.example.com/"]));
        assert_eq!(flattened["forbid_node_port"], json!(true));
        assert_eq!(flattened["unique_ingress"], json!(true));
        assert_eq!(flattened["require_probe"], json!(false));
    }

    #[test]
    fn test_name_allows_fifty_characters() {
        let schema = OpaProfile.schema();
        let ok = crate::validation::validate(&schema, &json!({"name": "a".repeat(50)}));
        assert!(ok.is_empty());
        let too_long = crate::validation::validate(&schema, &json!({"name": "a".repeat(51)}));
        assert_eq!(too_long.len(), 1);
    }
}
