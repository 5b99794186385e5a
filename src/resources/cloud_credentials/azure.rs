//! Azure cloud credentials.

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
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_cloud_credential_azure",
    data_source_plural: "taikun_cloud_credentials_azure",
    list_attribute: "cloud_credentials",
    write_only: &["client_id", "client_secret"],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &["name", "client_id", "client_secret"],
};

static ROUTES: Routes = Routes {
    list: DASHBOARD_ROUTE,
    create: "/api/Azure/create",
    update: "/api/Azure/update",
    delete: DELETE_ROUTE,
    lock_manager: LOCK_ROUTE,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AzureCredentialDto {
    #[serde(flatten)]
    common: CommonDto,
    tenant_id: String,
    subscription_id: String,
    location: String,
    availability_zones_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAzureCredential {
    name: String,
    azure_client_id: String,
    azure_client_secret: String,
    azure_subscription_id: String,
    azure_tenant_id: String,
    azure_location: String,
    az_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAzureCredential<'a> {
    id: &'a ResourceId,
    name: String,
    azure_client_id: String,
    azure_client_secret: String,
}

/// Service principal of an Azure subscription.
pub struct AzureCredential;

#[async_trait]
impl Family for AzureCredential {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        credential_schema("Azure", false)
            .with_attribute(
                "client_id",
                Attribute::required_string()
                    .sensitive()
                    .with_env_default(&["ARM_CLIENT_ID"])
                    .with_description("The Azure client ID."),
            )
            .with_attribute(
                "client_secret",
                Attribute::required_string()
                    .sensitive()
                    .with_env_default(&["ARM_CLIENT_SECRET"])
                    .with_description("The Azure client secret."),
            )
            .with_attribute(
                "subscription_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["ARM_SUBSCRIPTION_ID"])
                    .with_validator(Validator::UuidString)
                    .with_description("The Azure subscription ID."),
            )
            .with_attribute(
                "tenant_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["ARM_TENANT_ID"])
                    .with_validator(Validator::UuidString)
                    .with_description("The Azure tenant ID."),
            )
            .with_attribute(
                "location",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["ARM_LOCATION"])
                    .with_description("The Azure location."),
            )
            .with_attribute(
                "az_count",
                Attribute::optional_int64()
                    .with_force_new()
                    .with_default(json!(1))
                    .with_validator(Validator::IntRange { min: 1, max: 3 })
                    .with_description(
                        "The number of Azure availability zones expected for the location.",
                    ),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: AzureCredentialDto = serde_json::from_value(dto)?;
        let mut flattened = dto.common.flatten();
        flattened.extend(record(json!({
            "tenant_id": dto.tenant_id,
            "subscription_id": dto.subscription_id,
            "location": dto.location,
            "az_count": dto.availability_zones_count,
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
        list_flattened(self, CloudCredentialKind::Azure, ctx, client, filter, offset).await
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = CreateAzureCredential {
            name: bag.string("name"),
            azure_client_id: bag.string("client_id"),
            azure_client_secret: bag.string("client_secret"),
            azure_subscription_id: bag.string("subscription_id"),
            azure_tenant_id: bag.string("tenant_id"),
            azure_location: bag.string("location"),
            az_count: bag.get_i64("az_count").unwrap_or(1),
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
        let body = UpdateAzureCredential {
            id,
            name: bag.string("name"),
            azure_client_id: bag.string("client_id"),
            azure_client_secret: bag.string("client_secret"),
        };
        client.update(ctx, ROUTES.update, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_must_be_uuid() {
        let diagnostics = crate::validation::validate(
            &AzureCredential.schema(),
            &json!({
                "name": "azure-a",
                "client_id": "c",
                "client_secret": "s",
                "subscription_id": "not-a-uuid",
                "tenant_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
                "location": "westeurope"
            }),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("subscription_id".to_string()));
    }

    #[test]
    fn test_create_body_shape() {
        let bag = AttributeBag::from_value(json!({
            "name": "azure-a",
            "client_id": "c",
            "client_secret": "s",
            "subscription_id": "sub",
            "tenant_id": "tenant",
            "location": "westeurope",
            "az_count": 3,
            "organization_id": "9"
        }))
        .unwrap();
        let body = CreateAzureCredential {
            name: bag.string("name"),
            azure_client_id: bag.string("client_id"),
            azure_client_secret: bag.string("client_secret"),
            azure_subscription_id: bag.string("subscription_id"),
            azure_tenant_id: bag.string("tenant_id"),
            azure_location: bag.string("location"),
            az_count: bag.get_i64("az_count").unwrap_or(1),
            organization_id: organization_id(&bag).unwrap(),
        };
        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["azureTenantId"], json!("tenant"));
        assert_eq!(wire["azCount"], json!(3));
        assert_eq!(wire["organizationId"], json!(9));
    }

    #[test]
    fn test_flatten_location() {
        let flattened = AzureCredential
            .flatten(json!({"id": 2, "location": "westeurope", "tenantId": "t"}))
            .unwrap();
        assert_eq!(flattened["location"], json!("westeurope"));
        assert_eq!(flattened["tenant_id"], json!("t"));
        assert!(!flattened.contains_key("client_secret"));
    }
}
