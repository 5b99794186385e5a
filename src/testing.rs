//! Helpers for driving a [`ProviderService`] from tests.
//!
//! [`ProviderTester`] runs every call under one [`OperationContext`] and
//! unwraps [`StateResult`]s into plain states, so a test reads like the host
//! conversation it stands in for:
//!
//! ```ignore
//! use hemmer_provider_taikun::testing::ProviderTester;
//! use hemmer_provider_taikun::TaikunProvider;
//! use serde_json::json;
//!
//! let tester = ProviderTester::new(TaikunProvider::new().with_client(client));
//! let state = tester
//!     .lifecycle_create("taikun_billing_credential", json!({"name": "billing-a"}))
//!     .await?;
//! assert_eq!(state["name"], "billing-a");
//! ```

use serde_json::Value;

use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult, StateResult};

/// Test harness around a provider.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
    ctx: OperationContext,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Drive `provider` with a background context.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            ctx: OperationContext::background(),
        }
    }

    /// Drive `provider` with `ctx` instead.
    pub fn with_context(mut self, ctx: OperationContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The context every call runs under.
    pub fn context(&self) -> &OperationContext {
        &self.ctx
    }

    /// Schemas of the wrapped provider.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Names of all resources.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Names of all data sources.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate the provider block; error diagnostics become a [`TestError`].
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure under the tester's context.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(&self.ctx, config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan with no prior state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan `config` against `prior_state`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan the removal of `prior_state`.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create and return the full result, diagnostics included.
    pub async fn create_result(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<StateResult, ProviderError> {
        self.provider
            .create(&self.ctx, resource_type, planned_state)
            .await
    }

    /// Create and return the state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, TestError> {
        into_state(self.create_result(resource_type, planned_state).await?)
    }

    /// Refresh and return the full result. A gone object has no state.
    pub async fn read_result(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<StateResult, ProviderError> {
        self.provider
            .read(&self.ctx, resource_type, current_state)
            .await
    }

    /// Refresh and return the state.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, TestError> {
        into_state(self.read_result(resource_type, current_state).await?)
    }

    /// Update and return the full result.
    pub async fn update_result(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<StateResult, ProviderError> {
        self.provider
            .update(&self.ctx, resource_type, prior_state, planned_state)
            .await
    }

    /// Update and return the state.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, TestError> {
        into_state(
            self.update_result(resource_type, prior_state, planned_state)
                .await?,
        )
    }

    /// Delete the object.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider
            .delete(&self.ctx, resource_type, current_state)
            .await
    }

    /// Import an object by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider
            .import_resource(&self.ctx, resource_type, id)
            .await
    }

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(&self.ctx, data_source_type, config)
            .await
    }

    /// Plan then create. Returns the created state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        let plan = self.plan_create(resource_type, config).await?;
        self.create(resource_type, plan.planned_state).await
    }

    /// Plan then update. Returns the updated state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        if plan.requires_replace {
            return Err(TestError::Replacement(
                plan.changes.into_iter().map(|c| c.path).collect(),
            ));
        }
        self.update(resource_type, prior_state, plan.planned_state)
            .await
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, TestError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.plan_delete(resource_type, updated.clone()).await?;
        self.delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Why a tester call did not produce a state.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Error diagnostics came back instead of a state.
    #[error("{} error diagnostic(s): {}", .0.len(), describe(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The provider call itself failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Read found nothing.
    #[error("object is gone")]
    Gone,
    /// Lists the attributes that force the replacement.
    #[error("plan replaces the object because of {0:?}")]
    Replacement(Vec<String>),
}

fn describe(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = d.summary.clone();
            if let Some(detail) = &d.detail {
                line = format!("{} ({})", line, detail);
            }
            match &d.attribute {
                Some(attribute) => format!("{}: {}", attribute, line),
                None => line,
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn into_state(result: StateResult) -> Result<Value, TestError> {
    if result.has_errors() {
        return Err(TestError::Diagnostics(result.diagnostics));
    }
    result.state.ok_or(TestError::Gone)
}

/// # Panics
///
/// Panics if the plan has no changes or replaces the object.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "create plan is empty");
    assert!(!plan.requires_replace, "create plan asks for a replacement");
}

/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
    assert!(paths.is_empty(), "plan changes {:?}", paths);
}

/// # Panics
///
/// Panics if the plan does not replace the object.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "plan updates in place");
}

/// # Panics
///
/// Panics if the plan replaces the object.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.requires_replace, "plan replaces the object");
}

/// # Panics
///
/// Panics if `path` is not among the plan's changes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
    assert!(paths.contains(&path), "'{}' is not among the changes {:?}", path, paths);
}

/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).cloned().collect();
    assert!(errors.is_empty(), "unexpected errors: {}", describe(&errors));
}

/// # Panics
///
/// Panics if no error diagnostic mentions `substring` in its summary or detail.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics.iter().filter(|d| d.is_error()).any(|d| {
        d.summary.contains(substring)
            || d.detail.as_deref().is_some_and(|detail| detail.contains(substring))
    });
    assert!(found, "no error mentions '{}': {}", substring, describe(diagnostics));
}

/// # Panics
///
/// Panics unless exactly `count` warnings carry `summary`.
pub fn assert_warning_count(diagnostics: &[Diagnostic], summary: &str, count: usize) {
    let found = diagnostics
        .iter()
        .filter(|d| d.severity == DiagnosticSeverity::Warning && d.summary == summary)
        .count();
    assert_eq!(
        found, count,
        "want {} '{}' warning(s), got {}: {:?}",
        count, summary, found, diagnostics
    );
}
