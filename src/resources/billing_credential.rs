//! Billing (Prometheus operation) credentials.

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
    resource: "taikun_billing_credential",
    data_source_plural: "taikun_billing_credentials",
    list_attribute: "billing_credentials",
    write_only: &["prometheus_password"],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &[],
};

static ROUTES: Routes = Routes {
    list: "/api/OperationCredentials/list",
    create: "/api/OperationCredentials/create",
    update: "/api/OperationCredentials/update",
    delete: "/api/OperationCredentials/delete",
    lock_manager: "/api/OperationCredentials/lockmanager",
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BillingCredentialDto {
    id: Option<i64>,
    name: String,
    prometheus_username: String,
    prometheus_url: String,
    organization_id: Option<i64>,
    organization_name: String,
    is_locked: bool,
    is_default: bool,
    created_by: String,
    last_modified: String,
    last_modified_by: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBillingCredential {
    name: String,
    prometheus_username: String,
    prometheus_password: String,
    prometheus_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

/// Credentials for the Prometheus instance billing data is read from.
pub struct BillingCredential;

#[async_trait]
impl Family for BillingCredential {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        with_audit(base_schema("Indicates whether to lock the billing credential."))
            .with_attribute(
                "name",
                name_attribute("The name of the billing credential.").with_force_new(),
            )
            .with_attribute(
                "prometheus_username",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["PROMETHEUS_USERNAME"])
                    .with_description("The Prometheus username."),
            )
            .with_attribute(
                "prometheus_password",
                Attribute::required_string()
                    .sensitive()
                    .with_force_new()
                    .with_env_default(&["PROMETHEUS_PASSWORD"])
                    .with_description("The Prometheus password."),
            )
            .with_attribute(
                "prometheus_url",
                Attribute::required_string()
                    .with_force_new()
                    .with_env_default(&["PROMETHEUS_URL"])
                    .with_description("The Prometheus URL."),
            )
            .with_attribute(
                "is_locked",
                Attribute::computed_bool().with_description("Whether the credential is locked."),
            )
            .with_attribute(
                "is_default",
                Attribute::computed_bool()
                    .with_description(
                        "Indicates whether the billing credential is the organization's default.",
                    ),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: BillingCredentialDto = serde_json::from_value(dto)?;
        Ok(record(json!({
            "id": id_string(dto.id),
            "name": dto.name,
            "prometheus_username": dto.prometheus_username,
            "prometheus_url": dto.prometheus_url,
            "organization_id": id_string(dto.organization_id),
            "organization_name": dto.organization_name,
            "lock": dto.is_locked,
            "is_locked": dto.is_locked,
            "is_default": dto.is_default,
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
        let body = CreateBillingCredential {
            name: bag.string("name"),
            prometheus_username: bag.string("prometheus_username"),
            prometheus_password: bag.string("prometheus_password"),
            prometheus_url: bag.string("prometheus_url"),
            organization_id: organization_id(bag)?,
        };
        client.create(ctx, ROUTES.create, &body).await
    }
}
