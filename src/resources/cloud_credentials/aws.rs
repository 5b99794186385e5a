//! AWS cloud credentials.

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
use crate::convert::{IdKind, ResourceId, AWS_REGIONS};
use crate::error::ProviderError;
use crate::paging::Page;
use crate::resources::{organization_id, record, Family, FamilyInfo, ListFilter, Record};
use crate::schema::{Attribute, Schema};
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_cloud_credential_aws",
    data_source_plural: "taikun_cloud_credentials_aws",
    list_attribute: "cloud_credentials",
    write_only: &["access_key_id", "secret_access_key"],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &["name", "access_key_id", "secret_access_key"],
};

static ROUTES: Routes = Routes {
    list: DASHBOARD_ROUTE,
    create: "/api/Aws/create",
    update: "/api/Aws/update",
    delete: DELETE_ROUTE,
    lock_manager: LOCK_ROUTE,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AwsCredentialDto {
    #[serde(flatten)]
    common: CommonDto,
    region: String,
    availability_zones_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAwsCredential {
    name: String,
    aws_access_key_id: String,
    aws_secret_access_key: String,
    aws_region: String,
    az_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAwsCredential<'a> {
    id: &'a ResourceId,
    name: String,
    aws_access_key_id: String,
    aws_secret_access_key: String,
}

/// Access keys for an AWS account.
pub struct AwsCredential;

#[async_trait]
impl Family for AwsCredential {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        credential_schema("AWS", false)
            .with_attribute(
                "access_key_id",
                Attribute::required_string()
                    .sensitive()
                    .with_env_default(&["AWS_ACCESS_KEY_ID"])
                    .with_description("The AWS access key ID."),
            )
            .with_attribute(
                "secret_access_key",
                Attribute::required_string()
                    .sensitive()
                    .with_env_default(&["AWS_SECRET_ACCESS_KEY"])
                    .with_description("The AWS secret access key."),
            )
            .with_attribute(
                "region",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["AWS_DEFAULT_REGION"])
                    .with_validator(Validator::one_of(AWS_REGIONS))
                    .with_description("The AWS region."),
            )
            .with_attribute(
                "az_count",
                Attribute::optional_int64()
                    .with_force_new()
                    .with_default(json!(1))
                    .with_validator(Validator::IntRange { min: 1, max: 3 })
                    .with_description(
                        "The number of AWS availability zones expected for the region.",
                    ),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: AwsCredentialDto = serde_json::from_value(dto)?;
        let mut flattened = dto.common.flatten();
        flattened.extend(record(json!({
            "region": dto.region,
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
        list_flattened(self, CloudCredentialKind::Aws, ctx, client, filter, offset).await
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = CreateAwsCredential {
            name: bag.string("name"),
            aws_access_key_id: bag.string("access_key_id"),
            aws_secret_access_key: bag.string("secret_access_key"),
            aws_region: bag.string("region"),
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
        let body = UpdateAwsCredential {
            id,
            name: bag.string("name"),
            aws_access_key_id: bag.string("access_key_id"),
            aws_secret_access_key: bag.string("secret_access_key"),
        };
        client.update(ctx, ROUTES.update, &body).await
    }
}
