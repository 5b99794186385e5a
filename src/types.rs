//! Values handed back to the host: plans, states, imports and metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Diagnostic;

/// One attribute a plan would change.
///
/// `before` is `None` for attributes that appear, `after` for those that go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub path: String,
    /// Value in the prior state.
    pub before: Option<Value>,
    /// Value in the planned state.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// A change from `before` to `after`.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// An attribute set for the first time.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// An attribute dropped from the state.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// An attribute whose value changed.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// What applying a configuration would do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// Configuration with defaults filled and computed values carried over.
    pub planned_state: Value,
    /// Attributes that differ from the prior state.
    pub changes: Vec<AttributeChange>,
    /// A force-new attribute changed; the host destroys and recreates.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Nothing to do.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// Outcome of create, read and update.
///
/// `state` is `None` once the object is gone; the host drops it from state.
/// A failure after the server assigned an id still carries the state holding
/// that id, with the failure among the diagnostics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateResult {
    /// The new state, if the object exists.
    pub state: Option<Value>,
    /// Warnings and errors raised along the way.
    pub diagnostics: Vec<Diagnostic>,
}

impl StateResult {
    /// A state with no diagnostics.
    pub fn ok(state: Value) -> Self {
        Self {
            state: Some(state),
            diagnostics: Vec::new(),
        }
    }

    /// The object no longer exists.
    pub fn gone() -> Self {
        Self::default()
    }

    /// Attach diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// An existing object brought under management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource the object was imported as.
    pub resource_type: String,
    /// State read from the server.
    pub state: Value,
}

impl ImportedResource {
    /// Wrap a state read for `resource_type`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Names the host can address, plus capability flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource names.
    pub resources: Vec<String>,
    /// Singular and plural data source names.
    pub data_sources: Vec<String>,
    /// Optional protocol features.
    pub capabilities: ServerCapabilities,
}

/// Optional protocol features a provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// `plan` accepts a null proposed state and plans the removal.
    pub plan_destroy: bool,
}
