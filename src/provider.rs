//! The Taikun provider.
//!
//! [`TaikunProvider`] registers one resource, one singular and one plural
//! data source per family, and routes every host call to the
//! [`Lifecycle`] or [`DataSourceReader`] of the family it names. The REST
//! client is built once by `configure` and shared read-only afterwards.

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument, warn};

use crate::attributes::AttributeBag;
use crate::client::TaikunClient;
use crate::config::{provider_config_schema, ProviderConfig, RetryPolicy};
use crate::context::{OperationContext, OperationTimeouts};
use crate::data_source::{plural_schema, singular_schema, DataSourceReader};
use crate::error::ProviderError;
use crate::lifecycle::{Lifecycle, ReadMode};
use crate::resources::{all_families, Family};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    StateResult,
};
use crate::validation::validate;

/// Environment lookup used for attribute and provider defaults.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Which data source of a family is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataSourceKind {
    Single,
    Plural,
}

/// Provider for the Taikun platform.
pub struct TaikunProvider {
    families: Vec<Arc<dyn Family>>,
    client: OnceLock<Arc<TaikunClient>>,
    retry: RetryPolicy,
    timeouts: OperationTimeouts,
    env: EnvLookup,
}

impl fmt::Debug for TaikunProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaikunProvider")
            .field("families", &self.families.len())
            .field("client", &self.client.get())
            .field("retry", &self.retry)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl Default for TaikunProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TaikunProvider {
    /// An unconfigured provider reading defaults from the process environment.
    pub fn new() -> Self {
        Self {
            families: all_families(),
            client: OnceLock::new(),
            retry: RetryPolicy::default(),
            timeouts: OperationTimeouts::default(),
            env: Arc::new(|var: &str| std::env::var(var).ok()),
        }
    }

    /// Use another backoff for post-write reads.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use other deadlines when the host passes none.
    pub fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Resolve environment defaults through `env` instead of the process.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(env);
        self
    }

    /// Start out configured with an existing client.
    pub fn with_client(self, client: TaikunClient) -> Self {
        // A fresh OnceLock is always empty.
        let _ = self.client.set(Arc::new(client));
        self
    }

    fn client(&self) -> Result<&TaikunClient, ProviderError> {
        self.client
            .get()
            .map(Arc::as_ref)
            .ok_or_else(|| ProviderError::Configuration("provider is not configured".to_string()))
    }

    fn family(&self, resource_type: &str) -> Result<&dyn Family, ProviderError> {
        self.families
            .iter()
            .find(|family| family.info().resource == resource_type)
            .map(Arc::as_ref)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(
        &self,
        data_source_type: &str,
    ) -> Result<(&dyn Family, DataSourceKind), ProviderError> {
        self.families
            .iter()
            .find_map(|family| {
                let info = family.info();
                if info.resource == data_source_type {
                    Some((family.as_ref(), DataSourceKind::Single))
                } else if info.data_source_plural == data_source_type {
                    Some((family.as_ref(), DataSourceKind::Plural))
                } else {
                    None
                }
            })
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    fn data_source_schema(family: &dyn Family, kind: DataSourceKind) -> Schema {
        match kind {
            DataSourceKind::Single => singular_schema(family),
            DataSourceKind::Plural => plural_schema(family),
        }
    }

    fn lifecycle<'a>(&'a self, family: &'a dyn Family) -> Result<Lifecycle<'a>, ProviderError> {
        Ok(Lifecycle::new(family, self.client()?, self.retry))
    }

    /// Fill defaults and validate, failing before any network call.
    fn prepare(&self, schema: &Schema, state: Value) -> Result<AttributeBag, ProviderError> {
        let mut bag = AttributeBag::from_value(state)?;
        bag.apply_defaults(schema, self.env.as_ref());
        let value = bag.into_value();
        let diagnostics = validate(schema, &value);
        if !diagnostics.is_empty() {
            return Err(ProviderError::InvalidAttributes(diagnostics));
        }
        AttributeBag::from_value(value)
    }

    /// [`Self::prepare`] for an update: only attributes that differ from the
    /// prior state are held to the rules, so values the server already
    /// accepted do not block a lock toggle.
    fn prepare_update(
        &self,
        schema: &Schema,
        planned: Value,
        prior: Value,
    ) -> Result<AttributeBag, ProviderError> {
        let mut bag = AttributeBag::from_value(planned)?.with_prior(Some(prior));
        bag.apply_defaults(schema, self.env.as_ref());
        let diagnostics: Vec<Diagnostic> = validate(schema, &Value::Object(bag.as_map().clone()))
            .into_iter()
            .filter(|d| match d.attribute.as_deref() {
                Some(path) => bag.has_change(path.split('.').next().unwrap_or(path)),
                None => true,
            })
            .collect();
        if !diagnostics.is_empty() {
            return Err(ProviderError::InvalidAttributes(diagnostics));
        }
        Ok(bag)
    }
}

/// Carry server-computed values the configuration leaves open from `prior`.
fn carry_computed(schema: &Schema, planned: &mut AttributeBag, prior: &AttributeBag) {
    for (name, attr) in &schema.block.attributes {
        if attr.flags.computed && planned.get(name).is_none() {
            if let Some(value) = prior.get(name) {
                planned.set(name.clone(), value.clone());
            }
        }
    }
}

fn is_force_new(schema: &Schema, name: &str) -> bool {
    schema
        .attribute(name)
        .map(|attr| attr.force_new)
        .or_else(|| schema.block.blocks.get(name).map(|block| block.force_new))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl ProviderService for TaikunProvider {
    fn schema(&self) -> ProviderSchema {
        self.families.iter().fold(
            ProviderSchema::new().with_provider_config(provider_config_schema()),
            |schema, family| {
                let info = family.info();
                schema
                    .with_resource(info.resource, family.schema())
                    .with_data_source(info.resource, singular_schema(family.as_ref()))
                    .with_data_source(info.data_source_plural, plural_schema(family.as_ref()))
            },
        )
    }

    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.into_keys().collect();
        let mut data_sources: Vec<String> = schema.data_sources.into_keys().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let result = ProviderConfig::from_value(config, self.env.as_ref())
            .and_then(|config| config.credentials().map(|_| ()));
        Ok(match result {
            Ok(()) => vec![],
            Err(err) => err.into_diagnostics(),
        })
    }

    #[instrument(skip_all)]
    async fn configure(
        &self,
        ctx: &OperationContext,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        if self.client.get().is_some() {
            return Err(ProviderError::Configuration(
                "provider is already configured".to_string(),
            ));
        }
        let config = ProviderConfig::from_value(config, self.env.as_ref())?;
        debug!(config = ?config, "Configuring");
        let client = TaikunClient::connect(ctx, &config).await?;
        self.client.set(Arc::new(client)).map_err(|_| {
            ProviderError::Configuration("provider is already configured".to_string())
        })?;
        info!(base_url = %config.base_url(), "Provider configured");
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.family(resource_type)?.schema();
        Ok(match self.prepare(&schema, config) {
            Ok(_) => vec![],
            Err(err) => err.into_diagnostics(),
        })
    }

    #[instrument(skip(self, prior_state, proposed_state, config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let _ = config;
        let schema = self.family(resource_type)?.schema();
        let prior = prior_state
            .map(AttributeBag::from_value)
            .transpose()?
            .filter(|prior| !prior.as_map().is_empty());

        if proposed_state.is_null() {
            let changes = prior
                .iter()
                .flat_map(|prior| prior.as_map().iter())
                .map(|(name, value)| AttributeChange::removed(name.clone(), value.clone()))
                .collect();
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        }

        let mut planned = self.prepare(&schema, proposed_state)?;
        let Some(prior) = prior else {
            let changes = planned
                .as_map()
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(name, value)| AttributeChange::added(name.clone(), value.clone()))
                .collect();
            return Ok(PlanResult::with_changes(planned.into_value(), changes, false));
        };

        carry_computed(&schema, &mut planned, &prior);
        let mut changes = Vec::new();
        let mut requires_replace = false;
        for name in schema.names() {
            let before = prior.get(&name).cloned();
            let after = planned.get(&name).cloned();
            if before == after {
                continue;
            }
            if is_force_new(&schema, &name) {
                debug!(attribute = %name, "Change forces replacement");
                requires_replace = true;
            }
            changes.push(AttributeChange::new(name, before, after));
        }
        if changes.is_empty() {
            return Ok(PlanResult::no_change(planned.into_value()));
        }
        Ok(PlanResult::with_changes(
            planned.into_value(),
            changes,
            requires_replace,
        ))
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<StateResult, ProviderError> {
        let ctx = ctx.clone().or_timeout(self.timeouts.create);
        let family = self.family(resource_type)?;
        let mut bag = self.prepare(&family.schema(), planned_state)?;
        match self.lifecycle(family)?.create(&ctx, &mut bag).await {
            Ok(diagnostics) => Ok(StateResult::ok(bag.into_value()).with_diagnostics(diagnostics)),
            Err(err) if bag.id().is_some() => {
                warn!(
                    resource_type,
                    id = bag.id().unwrap_or_default(),
                    error = %err,
                    "Create did not converge"
                );
                Ok(StateResult::ok(bag.into_value()).with_diagnostics(err.into_diagnostics()))
            },
            Err(err) => Err(err),
        }
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        current_state: Value,
    ) -> Result<StateResult, ProviderError> {
        let ctx = ctx.clone().or_timeout(self.timeouts.read);
        let family = self.family(resource_type)?;
        let mut bag = AttributeBag::from_value(current_state)?;
        self.lifecycle(family)?
            .read(&ctx, &mut bag, ReadMode::Refresh)
            .await?;
        if bag.id().is_none() {
            info!(resource_type, "Object is gone, dropping it from state");
            return Ok(StateResult::gone());
        }
        Ok(StateResult::ok(bag.into_value()))
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<StateResult, ProviderError> {
        let ctx = ctx.clone().or_timeout(self.timeouts.update);
        let family = self.family(resource_type)?;
        let prior = AttributeBag::from_value(prior_state.clone())?;
        let mut bag = self.prepare_update(&family.schema(), planned_state, prior_state)?;
        if bag.id().is_none() {
            if let Some(id) = prior.id() {
                bag.set_id(id);
            }
        }
        let diagnostics = self.lifecycle(family)?.update(&ctx, &mut bag).await?;
        Ok(StateResult::ok(bag.into_value()).with_diagnostics(diagnostics))
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let ctx = ctx.clone().or_timeout(self.timeouts.delete);
        let family = self.family(resource_type)?;
        let mut bag = AttributeBag::from_value(current_state)?;
        self.lifecycle(family)?.delete(&ctx, &mut bag).await
    }

    async fn import_resource(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let ctx = ctx.clone().or_timeout(self.timeouts.read);
        let family = self.family(resource_type)?;
        let bag = self.lifecycle(family)?.import(&ctx, id).await?;
        Ok(vec![ImportedResource::new(resource_type, bag.into_value())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let (family, kind) = self.data_source(data_source_type)?;
        Ok(validate(&Self::data_source_schema(family, kind), &config))
    }

    #[instrument(skip(self, ctx, config))]
    async fn read_data_source(
        &self,
        ctx: &OperationContext,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let ctx = ctx.clone().or_timeout(self.timeouts.read);
        let (family, kind) = self.data_source(data_source_type)?;
        let diagnostics = validate(&Self::data_source_schema(family, kind), &config);
        if !diagnostics.is_empty() {
            return Err(ProviderError::InvalidAttributes(diagnostics));
        }
        let reader = DataSourceReader::new(family, self.client()?);
        match kind {
            DataSourceKind::Single => reader.read_one(&ctx, config).await,
            DataSourceKind::Plural => reader.read_all(&ctx, config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_plan_replaces, assert_plan_updates_in_place};
    use serde_json::json;

    fn provider() -> TaikunProvider {
        TaikunProvider::new().with_env(|_: &str| None)
    }

    fn billing() -> Value {
        json!({
            "name": "billing-a",
            "prometheus_username": "u",
            "prometheus_password": "p",
            "prometheus_url": "https://p/",
            "lock": true
        })
    }

    #[test]
    fn test_metadata_is_sorted_and_plans_destroy() {
        let metadata = provider().metadata();
        assert!(metadata.capabilities.plan_destroy);
        assert_eq!(metadata.resources.first().map(String::as_str), Some("taikun_access_profile"));
        assert!(metadata.resources.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_plan_destroy_lists_removed_attributes() {
        let plan = provider()
            .plan(
                "taikun_billing_credential",
                Some(json!({"id": "42", "name": "billing-a"})),
                Value::Null,
                Value::Null,
            )
            .await
            .unwrap();
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_schema_registers_three_entries_per_family() {
        let schema = provider().schema();
        assert_eq!(schema.resources.len(), 12);
        assert_eq!(schema.data_sources.len(), 24);
        assert!(schema.data_sources.contains_key("taikun_access_profiles"));
        assert!(schema.data_sources.contains_key("taikun_cloud_credential_proxmox"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_network() {
        let provider = provider();
        let err = provider
            .create(
                &OperationContext::background(),
                "taikun_billing_credential",
                json!({
                    "name": "b",
                    "prometheus_username": "u",
                    "prometheus_password": "p",
                    "prometheus_url": "x"
                }),
            )
            .await
            .unwrap_err();
        let diagnostics = err.into_diagnostics();
        assert!(!diagnostics.is_empty());
        assert!(diagnostics
            .iter()
            .all(|d| d.attribute.as_deref() == Some("name")));
    }

    #[tokio::test]
    async fn test_env_defaults_satisfy_required_attributes() {
        let provider = TaikunProvider::new().with_env(|var: &str| match var {
            "AWS_ACCESS_KEY_ID" => Some("AKIA".to_string()),
            "AWS_SECRET_ACCESS_KEY" => Some("secret".to_string()),
            "AWS_DEFAULT_REGION" => Some("eu-central-1".to_string()),
            _ => None,
        });
        let diagnostics = provider
            .validate_resource_config("taikun_cloud_credential_aws", json!({"name": "aws-a"}))
            .await
            .unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_refuses_network_calls() {
        let err = provider()
            .create(&OperationContext::background(), "taikun_billing_credential", billing())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let provider = provider();
        assert!(matches!(
            provider.plan("taikun_project", None, json!({}), json!({})).await,
            Err(ProviderError::UnknownResource(_))
        ));
        assert!(matches!(
            provider
                .read_data_source(&OperationContext::background(), "taikun_projects", json!({}))
                .await,
            Err(ProviderError::UnknownResource(_))
        ));
    }

    #[tokio::test]
    async fn test_update_validates_changed_attributes_before_network() {
        let prior = json!({"id": "5", "name": "access-a", "lock": false});
        let err = provider()
            .update(
                &OperationContext::background(),
                "taikun_access_profile",
                prior,
                json!({"id": "5", "name": "a!", "lock": false}),
            )
            .await
            .unwrap_err();
        let ProviderError::InvalidAttributes(diagnostics) = err else {
            panic!("expected attribute errors, got {:?}", err);
        };
        assert!(diagnostics
            .iter()
            .all(|d| d.attribute.as_deref() == Some("name")));
    }

    #[tokio::test]
    async fn test_update_tolerates_unchanged_server_values() {
        // The server accepted this name once; toggling the lock must not reject it.
        let prior = json!({"id": "5", "name": "legacy_name", "lock": false});
        let err = provider()
            .update(
                &OperationContext::background(),
                "taikun_access_profile",
                prior,
                json!({"id": "5", "name": "legacy_name", "lock": true}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_plan_lock_change_updates_in_place() {
        let provider = provider();
        let mut prior = billing();
        prior["id"] = json!("42");
        prior["is_locked"] = json!(true);
        let mut proposed = billing();
        proposed["lock"] = json!(false);

        let plan = provider
            .plan("taikun_billing_credential", Some(prior), proposed.clone(), proposed)
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "lock");
        assert_eq!(plan.planned_state["id"], json!("42"));
        assert_eq!(plan.planned_state["is_locked"], json!(true));
    }

    #[tokio::test]
    async fn test_plan_force_new_change_replaces() {
        let provider = provider();
        let mut prior = billing();
        prior["id"] = json!("42");
        let mut proposed = billing();
        proposed["prometheus_url"] = json!("https://q/");

        let plan = provider
            .plan("taikun_billing_credential", Some(prior), proposed.clone(), proposed)
            .await
            .unwrap();
        assert_plan_replaces(&plan);
    }

    #[tokio::test]
    async fn test_second_configure_is_rejected() {
        let client = TaikunClient::with_token("http://127.0.0.1:9", "token").unwrap();
        let provider = provider().with_client(client);
        let err = provider
            .configure(
                &OperationContext::background(),
                json!({"access_key": "a", "secret_key": "s"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_provider_config_needs_credentials() {
        let diagnostics = provider()
            .validate_provider_config(json!({"api_host": "api.example.com"}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
    }
}
