//! Resource families.
//!
//! A family bundles everything the lifecycle engine needs to know about one
//! kind of remote object: its schema, its routes, how to flatten a DTO into
//! attributes, how to inflate attributes into create and update bodies, and
//! which attribute drives its lock.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::attributes::AttributeBag;
use crate::client::{ListQuery, ListResponse, Routes, TaikunClient};
use crate::context::OperationContext;
use crate::convert::{atoi32, IdKind, LockMode, ResourceId};
use crate::error::ProviderError;
use crate::paging::Page;
use crate::schema::{Attribute, Schema};
use crate::validation::Validator;

pub mod access_profile;
pub mod billing_credential;
pub mod cloud_credentials;
pub mod kubernetes_profile;
pub mod opa_profile;
pub mod showback_credential;
pub mod standalone_profile;
pub mod user;

/// A flattened record: attribute name to value.
pub type Record = Map<String, Value>;

/// Static facts about a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyInfo {
    /// Resource and singular data source name.
    pub resource: &'static str,
    /// Plural data source name.
    pub data_source_plural: &'static str,
    /// Attribute of the plural data source holding the records.
    pub list_attribute: &'static str,
    /// Attributes the server never returns; dropped from data sources.
    pub write_only: &'static [&'static str],
    /// Shape of ids.
    pub id_kind: IdKind,
    /// Boolean attribute toggled through the lock manager.
    pub lock_attribute: &'static str,
    /// Attributes changed through the update endpoint.
    pub mutable: &'static [&'static str],
}

/// Filter of a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Single record.
    pub id: Option<ResourceId>,
    /// Organization scope.
    pub organization_id: Option<i32>,
}

impl ListFilter {
    /// Filter by one id.
    pub fn by_id(id: ResourceId) -> Self {
        Self {
            id: Some(id),
            organization_id: None,
        }
    }

    /// Filter by organization, if any.
    pub fn by_organization(organization_id: Option<i32>) -> Self {
        Self {
            id: None,
            organization_id,
        }
    }

    /// The REST query at `offset`.
    pub fn query(&self, offset: Option<i64>) -> ListQuery {
        ListQuery {
            id: self.id.map(|id| id.to_string()),
            organization_id: self.organization_id,
            offset,
        }
    }
}

/// One kind of remote object.
#[async_trait]
pub trait Family: Send + Sync {
    /// Static facts.
    fn info(&self) -> &FamilyInfo;

    /// Resource schema.
    fn schema(&self) -> Schema;

    /// Endpoints.
    fn routes(&self) -> &Routes;

    /// Convert one server record into attributes.
    fn flatten(&self, dto: Value) -> Result<Record, ProviderError>;

    /// List one page of flattened records.
    async fn list(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        filter: &ListFilter,
        offset: Option<i64>,
    ) -> Result<Page<Record>, ProviderError> {
        let response: ListResponse<Value> = client
            .list(ctx, self.routes().list, &filter.query(offset))
            .await?;
        Page::new(response.data, response.total_count).try_map(|dto| self.flatten(dto))
    }

    /// Create the object, returning its id.
    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError>;

    /// Apply changes of the mutable attributes.
    async fn update(
        &self,
        _ctx: &OperationContext,
        _client: &TaikunClient,
        _id: &ResourceId,
        _bag: &AttributeBag,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Delete the object.
    async fn delete(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        id: &ResourceId,
    ) -> Result<(), ProviderError> {
        client.delete(ctx, self.routes().delete, id).await
    }

    /// Lock or unlock the object.
    async fn set_lock(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        id: &ResourceId,
        locked: bool,
    ) -> Result<(), ProviderError> {
        client
            .lock_manager(ctx, self.routes().lock_manager, id, LockMode::from_bool(locked))
            .await
    }
}

/// Every family, cloud credential kinds first.
pub fn all_families() -> Vec<Arc<dyn Family>> {
    let mut families: Vec<Arc<dyn Family>> = cloud_credentials::CloudCredentialKind::ALL
        .iter()
        .map(|kind| kind.family())
        .collect();
    families.push(Arc::new(billing_credential::BillingCredential));
    families.push(Arc::new(showback_credential::ShowbackCredential));
    families.push(Arc::new(kubernetes_profile::KubernetesProfile));
    families.push(Arc::new(access_profile::AccessProfile));
    families.push(Arc::new(opa_profile::OpaProfile));
    families.push(Arc::new(standalone_profile::StandaloneProfile));
    families.push(Arc::new(user::User));
    families
}

/// The scope attribute as an integer, when set.
pub fn organization_id(bag: &AttributeBag) -> Result<Option<i32>, ProviderError> {
    bag.get_str("organization_id").map(atoi32).transpose()
}

/// Build a record from a `json!` object.
pub(crate) fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Stringify an optional numeric id; absent becomes the empty string.
pub(crate) fn id_string(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

/// A string member of a block instance; absent becomes the empty string.
pub(crate) fn item_str(item: &Record, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// An integer member of a block instance.
pub(crate) fn item_i64(item: &Record, key: &str) -> Option<i64> {
    item.get(key).and_then(Value::as_i64)
}

/// A block member holding a numeric id as string.
pub(crate) fn item_id(item: &Record) -> Option<i32> {
    item.get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// Resource name: 3 to 30 letters, digits or dashes.
pub(crate) fn name_attribute(description: &str) -> Attribute {
    Attribute::required_string()
        .with_validator(Validator::StringLength { min: 3, max: 30 })
        .with_validator(Validator::name_pattern())
        .with_description(description)
}

/// `id` plus the lock and organization attributes every family shares.
pub(crate) fn base_schema(lock_description: &str) -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("The ID of the object."),
        )
        .with_attribute(
            "lock",
            Attribute::optional_bool()
                .with_default(serde_json::json!(false))
                .with_description(lock_description),
        )
        .with_attribute(
            "organization_id",
            Attribute::optional_computed_string()
                .with_force_new()
                .with_validator(Validator::IntegerString)
                .with_description("The ID of the organization which owns the object."),
        )
        .with_attribute(
            "organization_name",
            Attribute::computed_string()
                .with_description("The name of the organization which owns the object."),
        )
}

/// Audit attributes returned by most credential families.
pub(crate) fn with_audit(schema: Schema) -> Schema {
    schema
        .with_attribute(
            "created_by",
            Attribute::computed_string().with_description("The creator of the object."),
        )
        .with_attribute(
            "last_modified",
            Attribute::computed_string().with_description("Time and date of last modification."),
        )
        .with_attribute(
            "last_modified_by",
            Attribute::computed_string()
                .with_description("The last user to have modified the object."),
        )
}
