//! The in-memory schema model.
//!
//! A [`Schema`] is a root [`SubSchema`] plus the [`Definitions`] it may refer
//! to. Nested nodes never own definitions of their own: recursive structure is
//! expressed by a [`SubSchema::Ref`] naming an entry of the root's
//! definitions, so the tree itself stays acyclic.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Prefix of every reference this crate knows how to resolve.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// A complete schema: a root body together with its named definitions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    pub definitions: Definitions,
    pub body: SubSchema,
}

impl Schema {
    /// Separates a schema into its definitions and its root body.
    pub fn split(self) -> (Definitions, SubSchema) {
        (self.definitions, self.body)
    }

    /// Re-attaches a set of definitions to a root body.
    pub fn join(definitions: Definitions, body: SubSchema) -> Self {
        Self { definitions, body }
    }
}

impl From<SubSchema> for Schema {
    fn from(body: SubSchema) -> Self {
        Self::join(Definitions::default(), body)
    }
}

/// Named definition bodies, keyed by local name (the part after
/// [`DEFINITIONS_PREFIX`]).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Definitions(BTreeMap<String, SubSchema>);

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, body: SubSchema) -> Option<SubSchema> {
        self.0.insert(name.into(), body)
    }

    pub fn get(&self, name: &str) -> Option<&SubSchema> {
        self.0.get(name)
    }

    /// Looks up a reference of the form `#/definitions/<name>`.
    ///
    /// References in any other form are never resolved.
    pub fn resolve(&self, ref_: &str) -> Option<&SubSchema> {
        ref_.strip_prefix(DEFINITIONS_PREFIX)
            .and_then(|name| self.get(name))
    }

    /// Adds every definition of `other` to `self`. On a name collision the
    /// entry from `other` wins.
    pub fn merge(&mut self, other: Definitions) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SubSchema)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, SubSchema)> for Definitions {
    fn from_iter<I: IntoIterator<Item = (String, SubSchema)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Returns the canonical reference string for a definition name.
pub fn definition_ref(name: &str) -> String {
    format!("{}{}", DEFINITIONS_PREFIX, name)
}

/// Annotations shared by every typed node. None of these are ever validated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub examples: Vec<Value>,
}

/// A property declared by an object schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub required: bool,
    pub schema: SubSchema,
}

/// Named string formats. Formats are carried and round-tripped, but never
/// checked by the validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StringFormat {
    DateTime,
    Email,
    Hostname,
    Ipv4,
    Ipv6,
    Uri,
    Custom(String),
}

impl StringFormat {
    pub fn as_str(&self) -> &str {
        match self {
            StringFormat::DateTime => "date-time",
            StringFormat::Email => "email",
            StringFormat::Hostname => "hostname",
            StringFormat::Ipv4 => "ipv4",
            StringFormat::Ipv6 => "ipv6",
            StringFormat::Uri => "uri",
            StringFormat::Custom(label) => label,
        }
    }
}

impl From<&str> for StringFormat {
    fn from(label: &str) -> Self {
        match label {
            "date-time" => StringFormat::DateTime,
            "email" => StringFormat::Email,
            "hostname" => StringFormat::Hostname,
            "ipv4" => StringFormat::Ipv4,
            "ipv6" => StringFormat::Ipv6,
            "uri" => StringFormat::Uri,
            other => StringFormat::Custom(other.to_owned()),
        }
    }
}

impl fmt::Display for StringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deferred schema body.
///
/// Forcing a thunk rebuilds the body every time. Two thunks compare equal only
/// if they are the same shared closure.
#[derive(Clone)]
pub struct Thunk(Arc<dyn Fn() -> SubSchema + Send + Sync>);

impl Thunk {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> SubSchema + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn force(&self) -> SubSchema {
        (self.0)()
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thunk(..)")
    }
}

impl PartialEq for Thunk {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A single schema node, without definitions attached.
#[derive(Clone, Debug, PartialEq)]
pub enum SubSchema {
    Object {
        metadata: Metadata,
        properties: Vec<Property>,
        min_properties: Option<u64>,
        max_properties: Option<u64>,
    },

    Array {
        metadata: Metadata,
        items: Option<Box<SubSchema>>,
        min_items: Option<u64>,
        max_items: Option<u64>,
    },

    Tuple {
        metadata: Metadata,
        items: Option<Vec<SubSchema>>,
        additional_items: Option<Box<SubSchema>>,
        min_items: Option<u64>,
        max_items: Option<u64>,
    },

    String {
        metadata: Metadata,
        enum_: Option<Vec<String>>,
        min_length: Option<u64>,
        max_length: Option<u64>,
        pattern: Option<String>,
        format: Option<StringFormat>,
    },

    Integer {
        metadata: Metadata,
        enum_: Option<Vec<i64>>,
        minimum: Option<i64>,
        maximum: Option<i64>,
    },

    Number {
        metadata: Metadata,
        enum_: Option<Vec<f64>>,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },

    Boolean {
        metadata: Metadata,
        enum_: Option<Vec<bool>>,
    },

    Null {
        metadata: Metadata,
    },

    Ref {
        metadata: Metadata,
        ref_: String,
    },

    OneOf {
        metadata: Metadata,
        sub_schemas: Vec<SubSchema>,
    },

    AnyOf {
        metadata: Metadata,
        sub_schemas: Vec<SubSchema>,
    },

    AllOf {
        metadata: Metadata,
        sub_schemas: Vec<SubSchema>,
    },

    Lazy(Thunk),

    /// A schema shape this crate does not model. Accepts every value.
    Fallback(Value),
}

impl Default for SubSchema {
    fn default() -> Self {
        SubSchema::Fallback(Value::Object(Default::default()))
    }
}

impl SubSchema {
    /// The annotations of this node, if it is a typed node.
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            SubSchema::Object { metadata, .. }
            | SubSchema::Array { metadata, .. }
            | SubSchema::Tuple { metadata, .. }
            | SubSchema::String { metadata, .. }
            | SubSchema::Integer { metadata, .. }
            | SubSchema::Number { metadata, .. }
            | SubSchema::Boolean { metadata, .. }
            | SubSchema::Null { metadata }
            | SubSchema::Ref { metadata, .. }
            | SubSchema::OneOf { metadata, .. }
            | SubSchema::AnyOf { metadata, .. }
            | SubSchema::AllOf { metadata, .. } => Some(metadata),
            SubSchema::Lazy(_) | SubSchema::Fallback(_) => None,
        }
    }

    pub(crate) fn metadata_mut(&mut self) -> Option<&mut Metadata> {
        match self {
            SubSchema::Object { metadata, .. }
            | SubSchema::Array { metadata, .. }
            | SubSchema::Tuple { metadata, .. }
            | SubSchema::String { metadata, .. }
            | SubSchema::Integer { metadata, .. }
            | SubSchema::Number { metadata, .. }
            | SubSchema::Boolean { metadata, .. }
            | SubSchema::Null { metadata }
            | SubSchema::Ref { metadata, .. }
            | SubSchema::OneOf { metadata, .. }
            | SubSchema::AnyOf { metadata, .. }
            | SubSchema::AllOf { metadata, .. } => Some(metadata),
            SubSchema::Lazy(_) | SubSchema::Fallback(_) => None,
        }
    }

    /// A short name for the kind of node, used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SubSchema::Object { .. } => "object",
            SubSchema::Array { .. } => "array",
            SubSchema::Tuple { .. } => "tuple",
            SubSchema::String { .. } => "string",
            SubSchema::Integer { .. } => "integer",
            SubSchema::Number { .. } => "number",
            SubSchema::Boolean { .. } => "boolean",
            SubSchema::Null { .. } => "null",
            SubSchema::Ref { .. } => "$ref",
            SubSchema::OneOf { .. } => "oneOf",
            SubSchema::AnyOf { .. } => "anyOf",
            SubSchema::AllOf { .. } => "allOf",
            SubSchema::Lazy(_) => "lazy",
            SubSchema::Fallback(_) => "fallback",
        }
    }
}
