//! Cloud credentials for the five supported providers.
//!
//! All kinds share one dashboard list endpoint whose response is partitioned
//! by kind, each partition with its own total count. [`CloudCredentialKind`]
//! picks the partition and the count, so every kind gets its own paged list
//! driver. Delete and lock go through shared routes; create and update are
//! per kind.

use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use super::{base_schema, id_string, name_attribute, record, with_audit, Family, ListFilter, Record};
use crate::client::TaikunClient;
use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::paging::Page;
use crate::schema::{Attribute, Schema};

pub mod aws;
pub mod azure;
pub mod gcp;
pub mod openstack;
pub mod proxmox;

/// Dashboard listing every kind at once.
pub const DASHBOARD_ROUTE: &str = "/api/CloudCredentials/list";
/// Shared delete route.
pub const DELETE_ROUTE: &str = "/api/CloudCredentials/delete";
/// Shared lock route.
pub const LOCK_ROUTE: &str = "/api/CloudCredentials/lockmanager";

/// The closed set of cloud credential kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudCredentialKind {
    /// Amazon Web Services.
    Aws,
    /// Microsoft Azure.
    Azure,
    /// Google Cloud Platform.
    Google,
    /// OpenStack.
    Openstack,
    /// Proxmox VE.
    Proxmox,
}

impl CloudCredentialKind {
    /// Every kind.
    pub const ALL: [Self; 5] = [
        Self::Aws,
        Self::Azure,
        Self::Google,
        Self::Openstack,
        Self::Proxmox,
    ];

    /// Parse a `type` token.
    pub fn parse(token: &str) -> Result<Self, ProviderError> {
        match token.to_ascii_lowercase().as_str() {
            "aws" | "amazon" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            "gcp" | "google" => Ok(Self::Google),
            "openstack" => Ok(Self::Openstack),
            "proxmox" => Ok(Self::Proxmox),
            other => Err(ProviderError::Conversion(format!(
                "{:?} is not a cloud credential type",
                other
            ))),
        }
    }

    /// The `type` token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Google => "gcp",
            Self::Openstack => "openstack",
            Self::Proxmox => "proxmox",
        }
    }

    /// Field of the dashboard response holding this kind's records.
    pub fn partition(self) -> &'static str {
        match self {
            Self::Aws => "amazon",
            Self::Azure => "azure",
            Self::Google => "google",
            Self::Openstack => "openstack",
            Self::Proxmox => "proxmox",
        }
    }

    /// Field of the dashboard response holding this kind's total.
    pub fn total_count_field(self) -> &'static str {
        match self {
            Self::Aws => "totalCountAws",
            Self::Azure => "totalCountAzure",
            Self::Google => "totalCountGoogle",
            Self::Openstack => "totalCountOpenstack",
            Self::Proxmox => "totalCountProxmox",
        }
    }

    /// The family handling this kind.
    pub fn family(self) -> Arc<dyn Family> {
        match self {
            Self::Aws => Arc::new(aws::AwsCredential),
            Self::Azure => Arc::new(azure::AzureCredential),
            Self::Google => Arc::new(gcp::GcpCredential),
            Self::Openstack => Arc::new(openstack::OpenstackCredential),
            Self::Proxmox => Arc::new(proxmox::ProxmoxCredential),
        }
    }

    /// One page of this kind's raw records from the dashboard.
    pub async fn list_page(
        self,
        ctx: &OperationContext,
        client: &TaikunClient,
        filter: &ListFilter,
        offset: Option<i64>,
    ) -> Result<Page<Value>, ProviderError> {
        let mut response: Value = client
            .list(ctx, DASHBOARD_ROUTE, &filter.query(offset))
            .await?;
        let total_count = response
            .get(self.total_count_field())
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let records = match response.get_mut(self.partition()).map(Value::take) {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(ProviderError::Invariant(format!(
                    "dashboard field {} is not a list: {}",
                    self.partition(),
                    other
                )))
            },
        };
        Ok(Page::new(records, total_count))
    }
}

impl fmt::Display for CloudCredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List one page of `kind` and flatten it through `family`.
pub(crate) async fn list_flattened(
    family: &dyn Family,
    kind: CloudCredentialKind,
    ctx: &OperationContext,
    client: &TaikunClient,
    filter: &ListFilter,
    offset: Option<i64>,
) -> Result<Page<Record>, ProviderError> {
    kind.list_page(ctx, client, filter, offset)
        .await?
        .try_map(|dto| family.flatten(dto))
}

/// Fields every kind's dashboard record carries.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct CommonDto {
    id: Option<i64>,
    name: String,
    organization_id: Option<i64>,
    organization_name: String,
    is_locked: bool,
    is_default: bool,
    created_by: String,
    last_modified: String,
    last_modified_by: String,
}

impl CommonDto {
    pub(crate) fn flatten(self) -> Record {
        record(json!({
            "id": id_string(self.id),
            "name": self.name,
            "organization_id": id_string(self.organization_id),
            "organization_name": self.organization_name,
            "lock": self.is_locked,
            "is_default": self.is_default,
            "created_by": self.created_by,
            "last_modified": self.last_modified,
            "last_modified_by": self.last_modified_by,
        }))
    }
}

/// Attributes every cloud credential kind shares.
pub(crate) fn credential_schema(label: &str, name_force_new: bool) -> Schema {
    let name = name_attribute(&format!("The name of the {} cloud credential.", label));
    let name = if name_force_new {
        name.with_force_new()
    } else {
        name
    };
    with_audit(base_schema(&format!(
        "Indicates whether to lock the {} cloud credential.",
        label
    )))
    .with_attribute("name", name)
    .with_attribute(
        "is_default",
        Attribute::computed_bool()
            .with_description("Indicates whether the credential is the organization's default."),
    )
}
