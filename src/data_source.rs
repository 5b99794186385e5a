//! Singular and plural data sources.
//!
//! Both are read-only views over a family's list endpoint. Their schemas are
//! derived from the resource schema, so a record is always projected onto the
//! derived attributes before it is returned.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::attributes::AttributeBag;
use crate::client::TaikunClient;
use crate::context::OperationContext;
use crate::convert::atoi32;
use crate::error::ProviderError;
use crate::paging::collect_pages;
use crate::resources::{Family, ListFilter};
use crate::schema::{derive_data_source_schema, plural_data_source_schema, Schema};

/// `id` of a plural data source listing every organization.
pub const ALL_ORGANIZATIONS: &str = "all";

/// Schema of the singular data source of `family`.
pub fn singular_schema(family: &dyn Family) -> Schema {
    let info = family.info();
    derive_data_source_schema(&family.schema(), info.write_only, info.id_kind)
}

/// Schema of the plural data source of `family`.
pub fn plural_schema(family: &dyn Family) -> Schema {
    plural_data_source_schema(&singular_schema(family), family.info().list_attribute)
}

/// Data source reads of one family.
pub struct DataSourceReader<'a> {
    family: &'a dyn Family,
    client: &'a TaikunClient,
}

impl<'a> DataSourceReader<'a> {
    /// Read `family` through `client`.
    pub fn new(family: &'a dyn Family, client: &'a TaikunClient) -> Self {
        Self { family, client }
    }

    /// Look up exactly one record by id.
    #[instrument(skip_all, fields(data_source = self.family.info().resource))]
    pub async fn read_one(
        &self,
        ctx: &OperationContext,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let info = self.family.info();
        let config = AttributeBag::from_value(config)?;
        let raw_id = config.get_str("id").ok_or_else(|| {
            ProviderError::Validation(format!("{} requires an id", info.resource))
        })?;
        let id = info.id_kind.parse(raw_id)?;

        let mut page = self
            .family
            .list(ctx, self.client, &ListFilter::by_id(id), None)
            .await?;
        let record = match page.records.len() {
            1 => page.records.remove(0),
            0 => {
                return Err(ProviderError::NotFound(format!(
                    "{} {}",
                    info.resource, id
                )))
            },
            n => {
                return Err(ProviderError::Invariant(format!(
                    "list by id {} returned {} records",
                    id, n
                )))
            },
        };

        let mut bag = AttributeBag::from_map(record);
        bag.set_id(id.to_string());
        Ok(bag.project_onto(&singular_schema(self.family)).into_value())
    }

    /// List every record, optionally scoped to one organization.
    #[instrument(skip_all, fields(data_source = self.family.info().data_source_plural))]
    pub async fn read_all(
        &self,
        ctx: &OperationContext,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let info = self.family.info();
        let config = AttributeBag::from_value(config)?;
        let organization = config.get_str("organization_id").map(str::to_string);
        let filter = ListFilter::by_organization(organization.as_deref().map(atoi32).transpose()?);

        let records = collect_pages(ctx, |offset| {
            self.family.list(ctx, self.client, &filter, offset)
        })
        .await?;
        debug!(count = records.len(), "Listed records");

        let element = singular_schema(self.family);
        let items: Vec<Value> = records
            .into_iter()
            .map(|record| AttributeBag::from_map(record).project_onto(&element).into_value())
            .collect();

        let mut result = AttributeBag::new();
        result.set("organization_id", organization.clone().unwrap_or_default());
        result.set(
            "id",
            organization.unwrap_or_else(|| ALL_ORGANIZATIONS.to_string()),
        );
        result.set(info.list_attribute, items);
        Ok(result.into_value())
    }
}
