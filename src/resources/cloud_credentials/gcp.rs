//! Google Cloud credentials.
//!
//! Created from a service account key file. Nothing but the lock changes in
//! place, so this family has no update body.

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
use crate::convert::IdKind;
use crate::error::ProviderError;
use crate::paging::Page;
use crate::resources::{organization_id, record, Family, FamilyInfo, ListFilter, Record};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_cloud_credential_gcp",
    data_source_plural: "taikun_cloud_credentials_gcp",
    list_attribute: "cloud_credentials",
    write_only: &["config_file", "import_project"],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &[],
};

static ROUTES: Routes = Routes {
    list: DASHBOARD_ROUTE,
    create: "/api/Google/create",
    update: "/api/Google/update",
    delete: DELETE_ROUTE,
    lock_manager: LOCK_ROUTE,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GcpCredentialDto {
    #[serde(flatten)]
    common: CommonDto,
    region: String,
    zones: Vec<String>,
    billing_account_id: String,
    billing_account_name: String,
    folder_id: String,
    project_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateGcpCredential {
    name: String,
    config_file_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    billing_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    folder_id: Option<String>,
    import_project: bool,
    region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

fn optional_force_new(description: &str) -> Attribute {
    Attribute::optional_string()
        .with_force_new()
        .with_description(description)
}

/// Read the service account key named by `config_file`.
async fn read_config_file(ctx: &OperationContext, path: &str) -> Result<String, ProviderError> {
    ctx.run("read config_file", async {
        tokio::fs::read_to_string(path).await.map_err(|e| {
            ProviderError::Validation(format!("cannot read config_file {:?}: {}", path, e))
        })
    })
    .await
}

/// A Google Cloud project reached through a service account.
pub struct GcpCredential;

#[async_trait]
impl Family for GcpCredential {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        credential_schema("Google", true)
            .with_attribute(
                "config_file",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::FilePath)
                    .with_description("The path of the service account key file."),
            )
            .with_attribute(
                "billing_account_id",
                optional_force_new("The ID of the billing account."),
            )
            .with_attribute("folder_id", optional_force_new("The ID of the folder."))
            .with_attribute(
                "import_project",
                Attribute::optional_bool()
                    .with_force_new()
                    .with_default(json!(false))
                    .with_description("Whether to import a project or not."),
            )
            .with_attribute(
                "region",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The region of the Google cloud credential."),
            )
            .with_attribute(
                "zones",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::computed(),
                )
                .with_description("Zones of the region."),
            )
            .with_attribute(
                "billing_account_name",
                Attribute::computed_string().with_description("The name of the billing account."),
            )
            .with_attribute(
                "project_id",
                Attribute::computed_string().with_description("The ID of the Google project."),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: GcpCredentialDto = serde_json::from_value(dto)?;
        let mut flattened = dto.common.flatten();
        flattened.extend(record(json!({
            "region": dto.region,
            "zones": dto.zones,
            "billing_account_id": dto.billing_account_id,
            "billing_account_name": dto.billing_account_name,
            "folder_id": dto.folder_id,
            "project_id": dto.project_id,
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
        list_flattened(self, CloudCredentialKind::Google, ctx, client, filter, offset).await
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = CreateGcpCredential {
            name: bag.string("name"),
            config_file_content: read_config_file(ctx, &bag.string("config_file")).await?,
            billing_account_id: bag.get_str("billing_account_id").map(str::to_string),
            folder_id: bag.get_str("folder_id").map(str::to_string),
            import_project: bag.get_bool("import_project"),
            region: bag.string("region"),
            organization_id: organization_id(bag)?,
        };
        client.create(ctx, ROUTES.create, &body).await
    }
}
