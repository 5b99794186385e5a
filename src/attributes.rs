//! The attribute bag passed into every lifecycle operation.
//!
//! A bag wraps the JSON object the host hands over, plus the prior state when
//! there is one, so change detection can compare the two.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::{AttributeType, Schema};

/// Placeholder written in place of sensitive values in logs.
pub const REDACTED: &str = "(sensitive)";

/// Host-owned mapping from attribute name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag {
    values: Map<String, Value>,
    prior: Option<Map<String, Value>>,
}

impl AttributeBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object. `null` yields an empty bag.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        match value {
            Value::Object(values) => Ok(Self {
                values,
                prior: None,
            }),
            Value::Null => Ok(Self::new()),
            other => Err(ProviderError::Validation(format!(
                "expected an attribute object, got {}",
                other
            ))),
        }
    }

    /// Wrap an already-built map.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values,
            prior: None,
        }
    }

    /// Attach the prior state used by change detection.
    pub fn with_prior(mut self, prior: Option<Value>) -> Self {
        self.prior = match prior {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };
        self
    }

    /// Unwrap into a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The value of `name`, treating `null` as absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// A non-empty string value.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// A string value, or the empty string.
    pub fn string(&self, name: &str) -> String {
        self.get_str(name).unwrap_or_default().to_string()
    }

    /// A boolean value; absent means `false`.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// An integer value.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// The string elements of a list or set value.
    pub fn get_string_list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The instances of a nested block.
    pub fn get_blocks(&self, name: &str) -> Vec<&Map<String, Value>> {
        self.get(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default()
    }

    /// Set an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// The recorded id, if any.
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    /// Record the id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.set("id", id.into());
    }

    /// Clear the id; the host treats a bag without id as gone.
    pub fn clear_id(&mut self) {
        self.values.remove("id");
    }

    /// Overwrite attributes with a flattened record.
    pub fn merge(&mut self, record: Map<String, Value>) {
        for (name, value) in record {
            self.values.insert(name, value);
        }
    }

    /// Whether `name` differs from the prior state.
    ///
    /// Without prior state every present value counts as a change.
    pub fn has_change(&self, name: &str) -> bool {
        let current = self.get(name);
        match &self.prior {
            Some(prior) => current != prior.get(name).filter(|v| !v.is_null()),
            None => current.is_some(),
        }
    }

    /// Whether any of `names` changed.
    pub fn has_changes(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has_change(name))
    }

    /// A boolean from the prior state; absent means `false`.
    pub fn prior_bool(&self, name: &str) -> bool {
        self.prior
            .as_ref()
            .and_then(|prior| prior.get(name))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Fill unset attributes from environment variables, then static defaults.
    pub fn apply_defaults<F>(&mut self, schema: &Schema, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, attr) in &schema.block.attributes {
            if self.get(name).is_some() || !attr.mutability().is_writable() {
                continue;
            }
            let from_env = attr
                .env_default
                .iter()
                .filter_map(|var| env(var))
                .find_map(|raw| parse_env_value(&attr.attr_type, &raw));
            if let Some(value) = from_env.or_else(|| attr.default.clone()) {
                self.values.insert(name.clone(), value);
            }
        }
    }

    /// A copy safe for logs: sensitive values replaced by a placeholder.
    pub fn redacted(&self, schema: &Schema) -> Value {
        let mut values = self.values.clone();
        for name in schema.sensitive_attributes() {
            if let Some(value) = values.get_mut(name) {
                if !value.is_null() {
                    *value = Value::String(REDACTED.to_string());
                }
            }
        }
        Value::Object(values)
    }

    /// Keep only the schema's attributes and fill the missing ones with their zero value.
    pub fn project_onto(&self, schema: &Schema) -> AttributeBag {
        let mut values = Map::new();
        for (name, attr) in &schema.block.attributes {
            let value = self
                .values
                .get(name)
                .cloned()
                .unwrap_or_else(|| zero_value(&attr.attr_type));
            values.insert(name.clone(), value);
        }
        for name in schema.block.blocks.keys() {
            let value = self
                .values
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            values.insert(name.clone(), value);
        }
        AttributeBag {
            values,
            prior: self.prior.clone(),
        }
    }
}

/// The semantic zero of a type.
pub fn zero_value(attr_type: &AttributeType) -> Value {
    match attr_type {
        AttributeType::String => Value::String(String::new()),
        AttributeType::Int64 => Value::from(0),
        AttributeType::Bool => Value::Bool(false),
        AttributeType::List(_) | AttributeType::Set(_) => Value::Array(Vec::new()),
        AttributeType::Object(_) => Value::Null,
    }
}

fn parse_env_value(attr_type: &AttributeType, raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    match attr_type {
        AttributeType::String => Some(Value::String(raw.to_string())),
        AttributeType::Int64 => raw.trim().parse::<i64>().ok().map(Value::from),
        AttributeType::Bool => match raw.trim() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        AttributeType::List(_) | AttributeType::Set(_) | AttributeType::Object(_) => None,
    }
}
