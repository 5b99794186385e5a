//! Attribute schemas of the provider block, resources and data sources.
//!
//! Every attribute carries its type, how it may be written (its [`Mutability`]),
//! validation rules, defaults and sensitivity. Data source schemas are derived
//! from resource schemas with [`derive_data_source_schema`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::convert::IdKind;
use crate::validation::Validator;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 text.
    String,
    /// A signed 64-bit integer.
    Int64,
    /// `true` or `false`.
    Bool,
    /// Ordered elements of one type.
    List(Box<AttributeType>),
    /// Unordered unique elements of one type.
    Set(Box<AttributeType>),
    /// Named fields, used for nested records in data sources.
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    /// A list of `element`.
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    /// A set of `element`.
    pub fn set(element: AttributeType) -> Self {
        Self::Set(Box::new(element))
    }
}

/// Host-facing flags of an attribute; see [`Mutability`] for what they imply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be configured.
    pub required: bool,
    /// May be configured.
    pub optional: bool,
    /// Filled from server records.
    pub computed: bool,
    /// Redacted from logs.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Must be configured.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// May be configured.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Server-owned.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Configurable, otherwise filled in by the server.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Mark as redacted.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// How an attribute may be written, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Must be set; changes are applied in place.
    RequiredWritable,
    /// May be set; changes are applied in place.
    OptionalWritable,
    /// Produced by the server only.
    ComputedReadOnly,
    /// May be set, falls back to a declared default; changes are applied in place.
    OptionalWithDefault,
    /// May be set; changing it replaces the resource.
    OptionalForceNew,
    /// Must be set; changing it replaces the resource.
    RequiredForceNew,
}

impl Mutability {
    /// Whether the attribute may appear in a create body.
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::ComputedReadOnly)
    }

    /// Whether the attribute may appear in an update body.
    pub fn is_updatable(self) -> bool {
        matches!(
            self,
            Self::RequiredWritable | Self::OptionalWritable | Self::OptionalWithDefault
        )
    }
}

/// One attribute: type, flags, replacement rule, defaults and validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Required, optional, computed and sensitive flags.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change replaces the object instead of updating it.
    #[serde(default)]
    pub force_new: bool,
    /// Used when neither configuration nor environment sets a value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Environment variables consulted, in order, before the static default.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_default: Vec<String>,
    /// Rules every present value must satisfy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
}

impl Attribute {
    /// An attribute with no description, default or rules.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            env_default: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// A string the configuration must set.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// A string the configuration may set.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// A string the server fills in when unset.
    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    /// A string only the server writes.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// An integer the configuration must set.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// An integer the configuration may set.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// A boolean the configuration may set.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// A boolean only the server writes.
    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    /// Set the documentation text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the object when this attribute changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Default applied when the configuration leaves the attribute unset.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Fall back to the first of these environment variables that is set.
    pub fn with_env_default(mut self, variables: &[&str]) -> Self {
        self.env_default = variables.iter().map(|v| v.to_string()).collect();
        self
    }

    /// Add a validation rule.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Mark as redacted from logs and plans.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Classify how this attribute may be written.
    pub fn mutability(&self) -> Mutability {
        let flags = self.flags;
        if flags.computed && !flags.optional && !flags.required {
            Mutability::ComputedReadOnly
        } else if flags.required && self.force_new {
            Mutability::RequiredForceNew
        } else if flags.required {
            Mutability::RequiredWritable
        } else if self.force_new {
            Mutability::OptionalForceNew
        } else if self.default.is_some() {
            Mutability::OptionalWithDefault
        } else {
            Mutability::OptionalWritable
        }
    }

    /// The same attribute as seen by a data source: computed, no rules, no default.
    pub fn as_computed(&self) -> Self {
        Self {
            attr_type: self.attr_type.clone(),
            flags: AttributeFlags {
                computed: true,
                sensitive: self.flags.sensitive,
                ..Default::default()
            },
            description: self.description.clone(),
            force_new: false,
            default: None,
            env_default: Vec::new(),
            validators: Vec::new(),
        }
    }
}

/// How many instances of a nested block may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one.
    #[default]
    Single,
    /// Any number, ordered.
    List,
    /// Any number, unordered.
    Set,
}

/// Attributes of a nested record such as an access profile's `ssh_user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Attributes keyed by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    /// Nested blocks keyed by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self {
            attributes: HashMap::new(),
            blocks: HashMap::new(),
            description: None,
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the documentation text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The object type of one instance of this block.
    pub fn object_type(&self) -> HashMap<String, AttributeType> {
        let mut types: HashMap<String, AttributeType> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.attr_type.clone()))
            .collect();
        for (name, nested) in &self.blocks {
            types.insert(name.clone(), nested.attribute_type());
        }
        types
    }

    fn as_computed(&self) -> Self {
        let mut attributes: HashMap<String, Attribute> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.as_computed()))
            .collect();
        for (name, nested) in &self.blocks {
            let mut attr = Attribute::new(nested.attribute_type(), AttributeFlags::computed());
            attr.description = nested.block.description.clone();
            attributes.insert(name.clone(), attr);
        }
        Self {
            attributes,
            blocks: HashMap::new(),
            description: self.description.clone(),
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// A block plus its cardinality and replacement rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Attributes of each instance.
    #[serde(flatten)]
    pub block: Block,
    /// Cardinality.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest instances accepted.
    #[serde(default)]
    pub min_items: u32,
    /// Most instances accepted; 0 means no limit.
    #[serde(default)]
    pub max_items: u32,
    /// Any change replaces the object.
    #[serde(default)]
    pub force_new: bool,
}

impl NestedBlock {
    /// An ordered list of blocks with no limits.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
            force_new: false,
        }
    }

    /// Cap the number of instances.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// Replace the object when any instance changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// The attribute type a data source uses for this block.
    pub fn attribute_type(&self) -> AttributeType {
        let object = AttributeType::Object(self.block.object_type());
        match self.nesting_mode {
            BlockNestingMode::Set => AttributeType::set(object),
            BlockNestingMode::Single | BlockNestingMode::List => AttributeType::list(object),
        }
    }
}

/// Schema of a resource, data source or the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when the stored state shape changes.
    #[serde(default)]
    pub version: u64,
    /// Top-level attributes and blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// An empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// An empty version-0 schema.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add a top-level attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a top-level nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Look up a top-level attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.get(name)
    }

    /// Names of every top-level attribute and block, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .block
            .attributes
            .keys()
            .chain(self.block.blocks.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Names of the attributes and blocks that can change without replacement, sorted.
    pub fn updatable(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.mutability().is_updatable())
            .map(|(name, _)| name.clone())
            .chain(
                self.block
                    .blocks
                    .iter()
                    .filter(|(_, nested)| !nested.force_new)
                    .map(|(name, _)| name.clone()),
            )
            .collect();
        names.sort();
        names
    }

    /// Names of the sensitive top-level attributes.
    pub fn sensitive_attributes(&self) -> Vec<&str> {
        self.block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.flags.sensitive)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Derive the read-only data source schema of a resource.
///
/// Every attribute becomes computed with no default, validation or required
/// flag, nested blocks become computed attributes of object type, the
/// `write_only` names are removed and `id` is re-added as a required string
/// checked against `id_kind`.
pub fn derive_data_source_schema(
    resource: &Schema,
    write_only: &[&str],
    id_kind: IdKind,
) -> Schema {
    let mut block = resource.block.as_computed();
    for name in write_only {
        block.attributes.remove(*name);
    }
    block.attributes.insert(
        "id".to_string(),
        Attribute::required_string()
            .with_validator(id_kind.validator())
            .with_description("The ID of the object to read."),
    );
    Schema {
        version: resource.version,
        block,
    }
}

/// Schema of a plural data source listing `element` records under `list_attribute`.
pub fn plural_data_source_schema(element: &Schema, list_attribute: &str) -> Schema {
    Schema::v0()
        .with_attribute(
            "organization_id",
            Attribute::optional_string()
                .with_validator(Validator::IntegerString)
                .with_description("Organization ID filter."),
        )
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("The organization filter, or \"all\"."),
        )
        .with_attribute(
            list_attribute,
            Attribute::new(
                AttributeType::list(AttributeType::Object(element.block.object_type())),
                AttributeFlags::computed(),
            )
            .with_description("The listed objects, in server order."),
        )
}

/// Every schema the provider serves, keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The provider block.
    #[serde(default)]
    pub provider: Schema,
    /// Resources keyed by type name, such as `taikun_access_profile`.
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    /// Singular and plural data sources.
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    /// No provider block, resources or data sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider block schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Register a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Register a data source schema.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation failed.
    Error,
    /// The operation went through; something deserves attention.
    Warning,
}

/// A message for the host, optionally tied to one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One-line message.
    pub summary: String,
    /// Longer explanation, such as an API error body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attribute name the message is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// An error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// A warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Tie the diagnostic to an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
