//! Showback credentials.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    base_schema, id_string, name_attribute, organization_id, record, with_audit, Family, FamilyInfo,
    Record,
};
use crate::attributes::AttributeBag;
use crate::client::{Routes, TaikunClient};
use crate::context::OperationContext;
use crate::convert::IdKind;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_showback_credential",
    data_source_plural: "taikun_showback_credentials",
    list_attribute: "showback_credentials",
    write_only: &["password"],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &[],
};

static ROUTES: Routes = Routes {
    list: "/api/ShowbackCredentials/list",
    create: "/api/ShowbackCredentials/create",
    update: "/api/ShowbackCredentials/update",
    delete: "/api/ShowbackCredentials/delete",
    lock_manager: "/api/ShowbackCredentials/lockmanager",
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ShowbackCredentialDto {
    id: Option<i64>,
    name: String,
    url: String,
    username: String,
    organization_id: Option<i64>,
    organization_name: String,
    is_locked: bool,
    created_by: String,
    last_modified: String,
    last_modified_by: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateShowbackCredential {
    name: String,
    url: String,
    username: String,
    password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

/// Credentials for the Prometheus instance showback rules query.
pub struct ShowbackCredential;

#[async_trait]
impl Family for ShowbackCredential {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        with_audit(base_schema("Indicates whether to lock the showback credential."))
            .with_attribute(
                "name",
                name_attribute("The name of the showback credential.").with_force_new(),
            )
            .with_attribute(
                "url",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("URL of the source."),
            )
            .with_attribute(
                "username",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The Prometheus username."),
            )
            .with_attribute(
                "password",
                Attribute::required_string()
                    .sensitive()
                    .with_force_new()
                    .with_description("The Prometheus password."),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: ShowbackCredentialDto = serde_json::from_value(dto)?;
        Ok(record(json!({
            "id": id_string(dto.id),
            "name": dto.name,
            "url": dto.url,
            "username": dto.username,
            "organization_id": id_string(dto.organization_id),
            "organization_name": dto.organization_name,
            "lock": dto.is_locked,
            "created_by": dto.created_by,
            "last_modified": dto.last_modified,
            "last_modified_by": dto.last_modified_by,
        })))
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = CreateShowbackCredential {
            name: bag.string("name"),
            url: bag.string("url"),
            username: bag.string("username"),
            password: bag.string("password"),
            organization_id: organization_id(bag)?,
        };
        client.create(ctx, ROUTES.create, &body).await
    }
}
