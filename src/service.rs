//! The host seam.
//!
//! The host runtime drives a provider through [`ProviderService`]: schema
//! discovery, configuration, planning, the resource lifecycle and data source
//! reads. Every operation that reaches the network takes an
//! [`OperationContext`] carrying the host's cancellation and deadline.

use serde_json::Value;

use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, StateResult};

/// Operations a provider answers for the host.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Schemas of the provider block, resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Names of resources and data sources, derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    /// Validate the provider block.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Build the shared dependency handle from the provider block.
    async fn configure(
        &self,
        ctx: &OperationContext,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release resources before the host exits.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Validate a resource configuration without touching the network.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Compute the planned state and whether it needs a replacement.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource.
    async fn create(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<StateResult, ProviderError>;

    /// Refresh a resource.
    async fn read(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        current_state: Value,
    ) -> Result<StateResult, ProviderError>;

    /// Update a resource in place.
    async fn update(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<StateResult, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError>;

    /// Bring an existing object under management.
    async fn import_resource(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = (ctx, id);
        Err(ProviderError::Unimplemented(format!(
            "import of {}",
            resource_type
        )))
    }

    /// Validate a data source configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        ctx: &OperationContext,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (ctx, config);
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}
