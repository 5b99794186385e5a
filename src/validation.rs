//! Configuration checks that run before any network call.
//!
//! [`validate`] walks a `serde_json::Value` against a [`Schema`]: presence,
//! types, block cardinality and the per-attribute [`Validator`] rules. It
//! runs before any network call so a bad configuration never reaches the API.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_taikun::schema::{Schema, Attribute};
//! use hemmer_provider_taikun::validation::{validate, Validator};
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute(
//!         "name",
//!         Attribute::required_string()
//!             .with_validator(Validator::StringLength { min: 3, max: 30 }),
//!     )
//!     .with_attribute(
//!         "organization_id",
//!         Attribute::optional_string().with_validator(Validator::IntegerString),
//!     );
//!
//! assert!(validate(&schema, &json!({"name": "prod-creds"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "ab", "organization_id": "abc"}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, Mutability, NestedBlock, Schema,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::{LazyLock, Mutex, PoisonError};

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

static EMAIL: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN));

/// Compiled [`Validator::Pattern`] expressions, keyed by source text.
static PATTERNS: LazyLock<Mutex<HashMap<String, Regex>>> = LazyLock::new(Default::default);

/// Compile `pattern` once per process; later calls clone the cached
/// [`Regex`], which shares the compiled program.
fn compiled(pattern: &str) -> Result<Regex, String> {
    let mut cache = PATTERNS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern).map_err(|e| format!("invalid pattern {:?}: {}", pattern, e))?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// A rule applied to every present value of an attribute.
///
/// List and set attributes apply the rule to each element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    /// Character count within `min..=max`.
    StringLength {
        /// Fewest characters.
        min: usize,
        /// Most characters.
        max: usize,
    },
    /// Match of a regular expression.
    Pattern {
        /// Expression in `regex` syntax; anchor it with `^` and `$` for a full match.
        pattern: String,
    },
    /// One of a fixed set of strings.
    OneOf {
        /// Accepted values, compared case-sensitively.
        values: Vec<String>,
    },
    /// Integer within `min..=max`.
    IntRange {
        /// Lowest accepted value.
        min: i64,
        /// Highest accepted value.
        max: i64,
    },
    /// Decimal string holding a non-negative 32-bit integer.
    IntegerString,
    /// Canonical UUID string.
    UuidString,
    /// Email address.
    Email,
    /// Path of an existing local file.
    FilePath,
    /// IPv4 or IPv6 address.
    IpAddress,
    /// Network in CIDR notation.
    Cidr,
}

impl Validator {
    /// Shorthand for the alphanumeric-and-dash name pattern.
    pub fn name_pattern() -> Self {
        Self::Pattern {
            pattern: "^[a-zA-Z0-9-]+$".to_string(),
        }
    }

    /// Build a [`Validator::OneOf`] from string slices.
    pub fn one_of(values: &[&str]) -> Self {
        Self::OneOf {
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Check a single value, returning a human-readable reason on failure.
    ///
    /// Values of the wrong JSON type are left to the type check.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::IntRange { min, max } => match value.as_i64() {
                Some(n) if n < *min || n > *max => {
                    Err(format!("must be between {} and {}, got {}", min, max, n))
                },
                _ => Ok(()),
            },
            _ => match value.as_str() {
                Some(s) => self.check_str(s),
                None => Ok(()),
            },
        }
    }

    fn check_str(&self, s: &str) -> Result<(), String> {
        match self {
            Self::StringLength { min, max } => {
                let len = s.chars().count();
                if len < *min || len > *max {
                    Err(format!(
                        "length must be between {} and {}, got {}",
                        min, max, len
                    ))
                } else {
                    Ok(())
                }
            },
            Self::Pattern { pattern } => {
                if compiled(pattern)?.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("{:?} must match {}", s, pattern))
                }
            },
            Self::OneOf { values } => {
                if values.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(format!("{:?} must be one of: {}", s, values.join(", ")))
                }
            },
            Self::IntegerString => match s.parse::<i32>() {
                Ok(n) if n >= 0 => Ok(()),
                _ => Err(format!("{:?} must be a non-negative integer", s)),
            },
            Self::UuidString => uuid::Uuid::parse_str(s)
                .map(|_| ())
                .map_err(|_| format!("{:?} must be a UUID", s)),
            Self::Email => {
                let re = EMAIL.as_ref().map_err(|e| e.to_string())?;
                if re.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("{:?} is not a valid email address", s))
                }
            },
            Self::FilePath => {
                if Path::new(s).is_file() {
                    Ok(())
                } else {
                    Err(format!("file {:?} does not exist", s))
                }
            },
            Self::IpAddress => s
                .parse::<IpAddr>()
                .map(|_| ())
                .map_err(|_| format!("{:?} is not a valid IP address", s)),
            Self::Cidr => check_cidr(s),
            Self::IntRange { .. } => Ok(()),
        }
    }
}

fn check_cidr(s: &str) -> Result<(), String> {
    let invalid = || format!("{:?} is not a valid CIDR", s);
    let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid());
    }
    Ok(())
}

/// Check `value` against `schema`.
///
/// Returns one error diagnostic per problem, each naming the attribute path
/// (`ntp_server.0.address` for block members and list elements). Computed-only
/// attributes are skipped and `null` counts as absent. Rules run only on
/// values whose type is right.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut walker = Walker::default();
    walker.block(&schema.block, value, "");
    walker.diagnostics
}

/// [`validate`] as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    match validate(schema, value) {
        diagnostics if diagnostics.is_empty() => Ok(()),
        diagnostics => Err(diagnostics),
    }
}

/// Whether `value` passes every check of [`validate`].
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Walker {
    diagnostics: Vec<Diagnostic>,
}

impl Walker {
    fn report(&mut self, path: &str, summary: String, detail: Option<String>) {
        let mut diagnostic = Diagnostic::error(summary);
        if let Some(detail) = detail {
            diagnostic = diagnostic.with_detail(detail);
        }
        if !path.is_empty() {
            diagnostic = diagnostic.with_attribute(path);
        }
        self.diagnostics.push(diagnostic);
    }

    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        let Some(fields) = value.as_object() else {
            self.report(path, "Expected object".to_string(), Some(format!("Got {}", kind(value))));
            return;
        };
        for (name, attr) in &block.attributes {
            let field = fields.get(name).filter(|v| !v.is_null());
            self.attribute(attr, field, &child(path, name));
        }
        for (name, nested) in &block.blocks {
            let field = fields.get(name).filter(|v| !v.is_null());
            self.nested(nested, field, &child(path, name));
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        if attr.mutability() == Mutability::ComputedReadOnly {
            return;
        }
        let Some(value) = value else {
            if attr.flags.required {
                self.report(
                    path,
                    format!("Missing required attribute '{}'", path),
                    Some("This attribute must be set in the configuration".to_string()),
                );
            }
            return;
        };
        let before = self.diagnostics.len();
        self.typed(&attr.attr_type, value, path);
        if self.diagnostics.len() > before {
            return;
        }
        match (&attr.attr_type, value) {
            (AttributeType::List(_) | AttributeType::Set(_), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.rules(&attr.validators, item, &format!("{}.{}", path, i));
                }
            },
            _ => self.rules(&attr.validators, value, path),
        }
    }

    fn rules(&mut self, validators: &[Validator], value: &Value, path: &str) {
        for validator in validators {
            if let Err(reason) = validator.check(value) {
                self.report(path, format!("Invalid value for attribute '{}'", path), Some(reason));
            }
        }
    }

    fn typed(&mut self, attr_type: &AttributeType, value: &Value, path: &str) {
        let expected = match (attr_type, value) {
            (AttributeType::String, Value::String(_)) => return,
            (AttributeType::Bool, Value::Bool(_)) => return,
            (AttributeType::Int64, Value::Number(n)) if is_whole(n) => return,
            (AttributeType::List(element) | AttributeType::Set(element), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.typed(element, item, &format!("{}.{}", path, i));
                }
                return;
            },
            (AttributeType::Object(fields), Value::Object(map)) => {
                for (name, field_type) in fields {
                    if let Some(field) = map.get(name).filter(|v| !v.is_null()) {
                        self.typed(field_type, field, &child(path, name));
                    }
                }
                return;
            },
            (AttributeType::String, _) => "string",
            (AttributeType::Int64, _) => "int64",
            (AttributeType::Bool, _) => "bool",
            (AttributeType::List(_), _) => "list",
            (AttributeType::Set(_), _) => "set",
            (AttributeType::Object(_), _) => "object",
        };
        self.report(
            path,
            format!("Invalid type for attribute '{}'", path),
            Some(format!("Expected {}, got {}", expected, kind(value))),
        );
    }

    fn nested(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        let Some(value) = value else {
            if nested.min_items > 0 {
                self.report(
                    path,
                    format!("Block '{}' requires at least {} item(s)", path, nested.min_items),
                    None,
                );
            }
            return;
        };
        if nested.nesting_mode == BlockNestingMode::Single {
            self.block(&nested.block, value, path);
            return;
        }
        let Some(items) = value.as_array() else {
            self.report(
                path,
                format!("Expected list for block '{}'", path),
                Some(format!("Got {}", kind(value))),
            );
            return;
        };
        let len = items.len() as u32;
        if len < nested.min_items {
            self.report(
                path,
                format!(
                    "Block '{}' requires at least {} item(s), got {}",
                    path, nested.min_items, len
                ),
                None,
            );
        }
        if nested.max_items > 0 && len > nested.max_items {
            self.report(
                path,
                format!(
                    "Block '{}' allows at most {} item(s), got {}",
                    path, nested.max_items, len
                ),
                None,
            );
        }
        for (i, item) in items.iter().enumerate() {
            self.block(&nested.block, item, &format!("{}.{}", path, i));
        }
    }
}

fn child(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integers, including floats with no fractional part such as `42.0`.
fn is_whole(n: &serde_json::Number) -> bool {
    n.is_i64()
        || n.as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
}
