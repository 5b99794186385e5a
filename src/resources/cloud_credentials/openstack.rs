//! OpenStack cloud credentials.

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
use crate::schema::{Attribute, Schema};

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_cloud_credential_openstack",
    data_source_plural: "taikun_cloud_credentials_openstack",
    list_attribute: "cloud_credentials",
    write_only: &["password", "url"],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &["name", "user", "password"],
};

static ROUTES: Routes = Routes {
    list: DASHBOARD_ROUTE,
    create: "/api/Openstack/create",
    update: "/api/Openstack/update",
    delete: DELETE_ROUTE,
    lock_manager: LOCK_ROUTE,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OpenstackCredentialDto {
    #[serde(flatten)]
    common: CommonDto,
    user: String,
    domain: String,
    tenant_name: String,
    tenant_id: String,
    public_network: String,
    region: String,
    availability_zone: String,
    imported_network_subnet_id: String,
    volume_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOpenstackCredential {
    name: String,
    open_stack_user: String,
    open_stack_password: String,
    open_stack_url: String,
    open_stack_domain: String,
    open_stack_project: String,
    open_stack_public_network: String,
    open_stack_region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    open_stack_availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    open_stack_imported_network_subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    open_stack_volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOpenstackCredential<'a> {
    id: &'a ResourceId,
    name: String,
    open_stack_user: String,
    open_stack_password: String,
}

fn required_from_env(variable: &str, description: &str) -> Attribute {
    Attribute::required_string()
        .with_force_new()
        .with_env_default(&[variable])
        .with_description(description)
}

fn optional_computed(description: &str) -> Attribute {
    Attribute::optional_computed_string()
        .with_force_new()
        .with_description(description)
}

/// A project of an OpenStack cloud.
pub struct OpenstackCredential;

#[async_trait]
impl Family for OpenstackCredential {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        credential_schema("OpenStack", false)
            .with_attribute(
                "user",
                Attribute::required_string()
                    .with_env_default(&["OS_USERNAME"])
                    .with_description("The OpenStack user."),
            )
            .with_attribute(
                "password",
                Attribute::required_string()
                    .sensitive()
                    .with_env_default(&["OS_PASSWORD"])
                    .with_description("The OpenStack password."),
            )
            .with_attribute(
                "url",
                required_from_env("OS_AUTH_URL", "The OpenStack authentication URL."),
            )
            .with_attribute(
                "domain",
                required_from_env("OS_USER_DOMAIN_NAME", "The OpenStack domain."),
            )
            .with_attribute(
                "project_name",
                required_from_env("OS_PROJECT_NAME", "The OpenStack project name."),
            )
            .with_attribute(
                "project_id",
                Attribute::computed_string().with_description("The OpenStack project ID."),
            )
            .with_attribute(
                "public_network_name",
                required_from_env(
                    "OS_INTERFACE",
                    "The name of the public OpenStack network to use.",
                ),
            )
            .with_attribute(
                "region",
                required_from_env("OS_REGION_NAME", "The OpenStack region."),
            )
            .with_attribute(
                "availability_zone",
                optional_computed("The OpenStack availability zone."),
            )
            .with_attribute(
                "imported_network_subnet_id",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("The OpenStack network subnet ID to import a network."),
            )
            .with_attribute(
                "volume_type_name",
                optional_computed("The OpenStack type of volume."),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: OpenstackCredentialDto = serde_json::from_value(dto)?;
        let mut flattened = dto.common.flatten();
        flattened.extend(record(json!({
            "user": dto.user,
            "domain": dto.domain,
            "project_name": dto.tenant_name,
            "project_id": dto.tenant_id,
            "public_network_name": dto.public_network,
            "region": dto.region,
            "availability_zone": dto.availability_zone,
            "imported_network_subnet_id": dto.imported_network_subnet_id,
            "volume_type_name": dto.volume_type,
        })));
        Ok(flattened)
    }

    async fn list(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        filter: &ListFilter,
        offset: Option<i64>,
    ) -> Result<Page<Record>, ProviderError> {
        list_flattened(self, CloudCredentialKind::Openstack, ctx, client, filter, offset).await
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let optional = |name: &str| bag.get_str(name).map(str::to_string);
        let body = CreateOpenstackCredential {
            name: bag.string("name"),
            open_stack_user: bag.string("user"),
            open_stack_password: bag.string("password"),
            open_stack_url: bag.string("url"),
            open_stack_domain: bag.string("domain"),
            open_stack_project: bag.string("project_name"),
            open_stack_public_network: bag.string("public_network_name"),
            open_stack_region: bag.string("region"),
            open_stack_availability_zone: optional("availability_zone"),
            open_stack_imported_network_subnet_id: optional("imported_network_subnet_id"),
            open_stack_volume_type: optional("volume_type_name"),
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
        let body = UpdateOpenstackCredential {
            id,
            name: bag.string("name"),
            open_stack_user: bag.string("user"),
            open_stack_password: bag.string("password"),
        };
        client.update(ctx, ROUTES.update, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_maps_tenant_fields() {
        let flattened = OpenstackCredential
            .flatten(json!({
                "id": 77,
                "user": "admin",
                "tenantName": "proj",
                "tenantId": "abc",
                "publicNetwork": "public",
                "volumeType": "ssd"
            }))
            .unwrap();
        assert_eq!(flattened["project_name"], json!("proj"));
        assert_eq!(flattened["project_id"], json!("abc"));
        assert_eq!(flattened["public_network_name"], json!("public"));
        assert_eq!(flattened["volume_type_name"], json!("ssd"));
        assert!(!flattened.contains_key("password"));
        assert!(!flattened.contains_key("url"));
    }

    #[test]
    fn test_user_change_is_an_update() {
        let bag = AttributeBag::from_value(json!({"name": "os", "user": "new"}))
            .unwrap()
            .with_prior(Some(json!({"name": "os", "user": "old"})));
        assert!(bag.has_changes(INFO.mutable));
    }
}
