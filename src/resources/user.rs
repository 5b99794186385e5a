//! Platform users. Ids are UUIDs and the lock attribute is `disable`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{id_string, organization_id, record, Family, FamilyInfo, Record};
use crate::attributes::AttributeBag;
use crate::client::{Routes, TaikunClient};
use crate::context::OperationContext;
use crate::convert::{IdKind, ResourceId, UserRole};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_user",
    data_source_plural: "taikun_users",
    list_attribute: "users",
    write_only: &[],
    id_kind: IdKind::Uuid,
    lock_attribute: "disable",
    mutable: &["email", "role", "display_name"],
};

static ROUTES: Routes = Routes {
    list: "/api/Users/list",
    create: "/api/Users/create",
    update: "/api/Users/update",
    delete: "/api/Users/delete",
    lock_manager: "/api/Users/lockmanager",
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserDto {
    id: String,
    username: String,
    email: String,
    role: String,
    display_name: String,
    organization_id: Option<i64>,
    organization_name: String,
    is_locked: bool,
    owner: bool,
    is_email_confirmed: bool,
    is_email_notification_enabled: bool,
    is_csm: bool,
    is_approved_by_partner: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<ResourceId>,
    username: String,
    email: String,
    role: UserRole,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

impl UserBody {
    fn from_bag(bag: &AttributeBag) -> Result<Self, ProviderError> {
        Ok(Self {
            id: None,
            username: bag.string("user_name"),
            email: bag.string("email"),
            role: UserRole::parse(bag.get_str("role").unwrap_or("User"))?,
            display_name: bag.string("display_name"),
            organization_id: None,
        })
    }
}

fn computed_flag(description: &str) -> Attribute {
    Attribute::computed_bool().with_description(description)
}

/// A user account of an organization.
pub struct User;

#[async_trait]
impl Family for User {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("The UUID of the user."),
            )
            .with_attribute(
                "user_name",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::StringLength { min: 3, max: 30 })
                    .with_description("The name of the user."),
            )
            .with_attribute(
                "email",
                Attribute::required_string()
                    .with_validator(Validator::Email)
                    .with_description("The email of the user."),
            )
            .with_attribute(
                "role",
                Attribute::required_string()
                    .with_validator(Validator::one_of(UserRole::TOKENS))
                    .with_description("The role of the user: User or Manager."),
            )
            .with_attribute(
                "display_name",
                Attribute::optional_string().with_description("The user's display name."),
            )
            .with_attribute(
                "organization_id",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_validator(Validator::IntegerString)
                    .with_description("The ID of the user's organization."),
            )
            .with_attribute(
                "organization_name",
                Attribute::computed_string()
                    .with_description("The name of the user's organization."),
            )
            .with_attribute(
                "disable",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Indicates whether the user is locked."),
            )
            .with_attribute(
                "is_owner",
                computed_flag("Indicates whether the user is the owner of their organization."),
            )
            .with_attribute(
                "is_email_confirmed",
                computed_flag("Indicates whether the email of the user has been confirmed."),
            )
            .with_attribute(
                "is_email_notification_enabled",
                computed_flag(
                    "Indicates whether the user has enabled notifications on their email.",
                ),
            )
            .with_attribute(
                "is_csm",
                computed_flag("Indicates whether the user is a Customer Success Manager."),
            )
            .with_attribute(
                "is_approved_by_partner",
                computed_flag("Indicates whether the user account is approved by its Partner."),
            )
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: UserDto = serde_json::from_value(dto)?;
        Ok(record(json!({
            "id": dto.id,
            "user_name": dto.username,
            "email": dto.email,
            "role": dto.role,
            "display_name": dto.display_name,
            "organization_id": id_string(dto.organization_id),
            "organization_name": dto.organization_name,
            "disable": dto.is_locked,
            "is_owner": dto.owner,
            "is_email_confirmed": dto.is_email_confirmed,
            "is_email_notification_enabled": dto.is_email_notification_enabled,
            "is_csm": dto.is_csm,
            "is_approved_by_partner": dto.is_approved_by_partner,
        })))
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let body = UserBody {
            organization_id: organization_id(bag)?,
            ..UserBody::from_bag(bag)?
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
        let body = UserBody {
            id: Some(*id),
            ..UserBody::from_bag(bag)?
        };
        client.update(ctx, ROUTES.update, &body).await
    }
}
