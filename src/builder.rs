//! Fluent construction of [`Schema`] values.
//!
//! Every function here returns a builder for one kind of node. Builders are
//! plain values: each setter consumes the builder and returns it, and a
//! finished builder converts into a [`Schema`] through [`From`] (or an explicit
//! `build()` call).
//!
//! ```
//! use json_schema_fuzz::builder::{array, integer, object, string};
//!
//! let schema = object()
//!     .title("person")
//!     .required("lastName", string().min_length(1))
//!     .optional("age", integer().minimum(0))
//!     .optional("nicknames", array().items(string()).max_items(3))
//!     .build();
//!
//! assert!(json_schema_fuzz::validate(&schema, &serde_json::json!({ "lastName": "x" })).is_empty());
//! ```
//!
//! Setters that take a nested schema hoist the child's definitions into the
//! builder, so a finished tree carries all of its definitions at the root.
//! Self-referential schemas are built with [`recurse`].

use crate::schema::{definition_ref, Definitions, Metadata, Property, Schema, StringFormat, SubSchema, Thunk};
use serde_json::Value;

macro_rules! metadata_setters {
    ($builder:ident) => {
        impl $builder {
            pub fn title(mut self, title: impl Into<String>) -> Self {
                self.metadata.title = Some(title.into());
                self
            }

            pub fn description(mut self, description: impl Into<String>) -> Self {
                self.metadata.description = Some(description.into());
                self
            }

            /// Appends a documentation example. Examples are never validated.
            pub fn example(mut self, example: impl Into<Value>) -> Self {
                self.metadata.examples.push(example.into());
                self
            }

            pub fn examples<I, V>(mut self, examples: I) -> Self
            where
                I: IntoIterator<Item = V>,
                V: Into<Value>,
            {
                self.metadata.examples = examples.into_iter().map(Into::into).collect();
                self
            }
        }

        impl From<$builder> for Schema {
            fn from(builder: $builder) -> Self {
                builder.build()
            }
        }
    };
}

/// Splits a child schema, moving its definitions into `definitions`.
fn hoist(definitions: &mut Definitions, child: impl Into<Schema>) -> SubSchema {
    let (child_definitions, body) = child.into().split();
    definitions.merge(child_definitions);
    body
}

#[derive(Debug, Default)]
pub struct ObjectBuilder {
    definitions: Definitions,
    metadata: Metadata,
    properties: Vec<Property>,
    min_properties: Option<u64>,
    max_properties: Option<u64>,
}

pub fn object() -> ObjectBuilder {
    ObjectBuilder::default()
}

impl ObjectBuilder {
    pub fn required(self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.property(name, true, schema)
    }

    pub fn optional(self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.property(name, false, schema)
    }

    /// Declaring a name twice replaces the earlier declaration in place, since
    /// the wire form can only hold one entry per name.
    fn property(mut self, name: impl Into<String>, required: bool, schema: impl Into<Schema>) -> Self {
        let name = name.into();
        let schema = hoist(&mut self.definitions, schema);

        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => {
                existing.required = required;
                existing.schema = schema;
            }
            None => self.properties.push(Property {
                name,
                required,
                schema,
            }),
        }

        self
    }

    pub fn min_properties(mut self, n: u64) -> Self {
        self.min_properties = Some(n);
        self
    }

    pub fn max_properties(mut self, n: u64) -> Self {
        self.max_properties = Some(n);
        self
    }

    pub fn build(self) -> Schema {
        Schema::join(
            self.definitions,
            SubSchema::Object {
                metadata: self.metadata,
                properties: self.properties,
                min_properties: self.min_properties,
                max_properties: self.max_properties,
            },
        )
    }
}

metadata_setters!(ObjectBuilder);

#[derive(Debug, Default)]
pub struct ArrayBuilder {
    definitions: Definitions,
    metadata: Metadata,
    items: Option<SubSchema>,
    min_items: Option<u64>,
    max_items: Option<u64>,
}

pub fn array() -> ArrayBuilder {
    ArrayBuilder::default()
}

impl ArrayBuilder {
    pub fn items(mut self, schema: impl Into<Schema>) -> Self {
        self.items = Some(hoist(&mut self.definitions, schema));
        self
    }

    pub fn min_items(mut self, n: u64) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: u64) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn build(self) -> Schema {
        Schema::join(
            self.definitions,
            SubSchema::Array {
                metadata: self.metadata,
                items: self.items.map(Box::new),
                min_items: self.min_items,
                max_items: self.max_items,
            },
        )
    }
}

metadata_setters!(ArrayBuilder);

#[derive(Debug, Default)]
pub struct TupleBuilder {
    definitions: Definitions,
    metadata: Metadata,
    items: Option<Vec<SubSchema>>,
    additional_items: Option<SubSchema>,
    min_items: Option<u64>,
    max_items: Option<u64>,
}

pub fn tuple() -> TupleBuilder {
    TupleBuilder::default()
}

impl TupleBuilder {
    /// Sets the positional item schemas, replacing any set before.
    pub fn items<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Schema>,
    {
        let definitions = &mut self.definitions;
        let items = schemas
            .into_iter()
            .map(|schema| hoist(definitions, schema))
            .collect();
        self.items = Some(items);
        self
    }

    pub fn additional_items(mut self, schema: impl Into<Schema>) -> Self {
        self.additional_items = Some(hoist(&mut self.definitions, schema));
        self
    }

    pub fn min_items(mut self, n: u64) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: u64) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn build(self) -> Schema {
        Schema::join(
            self.definitions,
            SubSchema::Tuple {
                metadata: self.metadata,
                items: self.items,
                additional_items: self.additional_items.map(Box::new),
                min_items: self.min_items,
                max_items: self.max_items,
            },
        )
    }
}

metadata_setters!(TupleBuilder);

#[derive(Debug, Default)]
pub struct StringBuilder {
    metadata: Metadata,
    enum_: Option<Vec<String>>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    pattern: Option<String>,
    format: Option<StringFormat>,
}

pub fn string() -> StringBuilder {
    StringBuilder::default()
}

impl StringBuilder {
    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_ = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn min_length(mut self, n: u64) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: u64) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn build(self) -> Schema {
        SubSchema::String {
            metadata: self.metadata,
            enum_: self.enum_,
            min_length: self.min_length,
            max_length: self.max_length,
            pattern: self.pattern,
            format: self.format,
        }
        .into()
    }
}

metadata_setters!(StringBuilder);

#[derive(Debug, Default)]
pub struct IntegerBuilder {
    metadata: Metadata,
    enum_: Option<Vec<i64>>,
    minimum: Option<i64>,
    maximum: Option<i64>,
}

pub fn integer() -> IntegerBuilder {
    IntegerBuilder::default()
}

impl IntegerBuilder {
    pub fn enum_values(mut self, values: impl IntoIterator<Item = i64>) -> Self {
        self.enum_ = Some(values.into_iter().collect());
        self
    }

    pub fn minimum(mut self, n: i64) -> Self {
        self.minimum = Some(n);
        self
    }

    pub fn maximum(mut self, n: i64) -> Self {
        self.maximum = Some(n);
        self
    }

    pub fn build(self) -> Schema {
        SubSchema::Integer {
            metadata: self.metadata,
            enum_: self.enum_,
            minimum: self.minimum,
            maximum: self.maximum,
        }
        .into()
    }
}

metadata_setters!(IntegerBuilder);

#[derive(Debug, Default)]
pub struct NumberBuilder {
    metadata: Metadata,
    enum_: Option<Vec<f64>>,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

pub fn number() -> NumberBuilder {
    NumberBuilder::default()
}

impl NumberBuilder {
    pub fn enum_values(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.enum_ = Some(values.into_iter().collect());
        self
    }

    pub fn minimum(mut self, n: f64) -> Self {
        self.minimum = Some(n);
        self
    }

    pub fn maximum(mut self, n: f64) -> Self {
        self.maximum = Some(n);
        self
    }

    pub fn build(self) -> Schema {
        SubSchema::Number {
            metadata: self.metadata,
            enum_: self.enum_,
            minimum: self.minimum,
            maximum: self.maximum,
        }
        .into()
    }
}

metadata_setters!(NumberBuilder);

#[derive(Debug, Default)]
pub struct BooleanBuilder {
    metadata: Metadata,
    enum_: Option<Vec<bool>>,
}

pub fn boolean() -> BooleanBuilder {
    BooleanBuilder::default()
}

impl BooleanBuilder {
    pub fn enum_values(mut self, values: impl IntoIterator<Item = bool>) -> Self {
        self.enum_ = Some(values.into_iter().collect());
        self
    }

    pub fn build(self) -> Schema {
        SubSchema::Boolean {
            metadata: self.metadata,
            enum_: self.enum_,
        }
        .into()
    }
}

metadata_setters!(BooleanBuilder);

#[derive(Debug, Default)]
pub struct NullBuilder {
    metadata: Metadata,
}

pub fn null() -> NullBuilder {
    NullBuilder::default()
}

impl NullBuilder {
    pub fn build(self) -> Schema {
        SubSchema::Null {
            metadata: self.metadata,
        }
        .into()
    }
}

metadata_setters!(NullBuilder);

#[derive(Debug)]
pub struct RefBuilder {
    metadata: Metadata,
    ref_: String,
}

/// A reference to the definition called `name`.
pub fn reference(name: &str) -> RefBuilder {
    RefBuilder {
        metadata: Default::default(),
        ref_: definition_ref(name),
    }
}

impl RefBuilder {
    pub fn build(self) -> Schema {
        SubSchema::Ref {
            metadata: self.metadata,
            ref_: self.ref_,
        }
        .into()
    }
}

metadata_setters!(RefBuilder);

#[derive(Clone, Copy, Debug)]
enum Combinator {
    OneOf,
    AnyOf,
    AllOf,
}

#[derive(Debug)]
pub struct CombinatorBuilder {
    combinator: Combinator,
    definitions: Definitions,
    metadata: Metadata,
    sub_schemas: Vec<SubSchema>,
}

fn combinator<I, S>(combinator: Combinator, schemas: I) -> CombinatorBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<Schema>,
{
    let mut definitions = Definitions::new();
    let sub_schemas = schemas
        .into_iter()
        .map(|schema| hoist(&mut definitions, schema))
        .collect();

    CombinatorBuilder {
        combinator,
        definitions,
        metadata: Default::default(),
        sub_schemas,
    }
}

/// Matches values accepted by exactly one of `schemas`.
pub fn one_of<I, S>(schemas: I) -> CombinatorBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<Schema>,
{
    combinator(Combinator::OneOf, schemas)
}

/// Matches values accepted by at least one of `schemas`.
pub fn any_of<I, S>(schemas: I) -> CombinatorBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<Schema>,
{
    combinator(Combinator::AnyOf, schemas)
}

/// Matches values accepted by all of `schemas`.
pub fn all_of<I, S>(schemas: I) -> CombinatorBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<Schema>,
{
    combinator(Combinator::AllOf, schemas)
}

impl CombinatorBuilder {
    pub fn build(self) -> Schema {
        let metadata = self.metadata;
        let sub_schemas = self.sub_schemas;

        let body = match self.combinator {
            Combinator::OneOf => SubSchema::OneOf {
                metadata,
                sub_schemas,
            },
            Combinator::AnyOf => SubSchema::AnyOf {
                metadata,
                sub_schemas,
            },
            Combinator::AllOf => SubSchema::AllOf {
                metadata,
                sub_schemas,
            },
        };

        Schema::join(self.definitions, body)
    }
}

metadata_setters!(CombinatorBuilder);

/// Builds a schema that refers to itself.
///
/// `f` receives a reference to `#/definitions/<name>` and returns the real
/// body. The body is stored under `name`, and the result is that same
/// reference with the definitions attached.
///
/// ```
/// use json_schema_fuzz::builder::{array, object, recurse, string};
/// use serde_json::json;
///
/// let tree = recurse("tree", |tree| {
///     object()
///         .required("name", string())
///         .optional("children", array().items(tree))
///         .build()
/// });
///
/// let value = json!({ "name": "a", "children": [{ "name": "b", "children": [] }] });
/// assert!(json_schema_fuzz::validate(&tree, &value).is_empty());
/// ```
pub fn recurse<F>(name: &str, f: F) -> Schema
where
    F: FnOnce(Schema) -> Schema,
{
    let (mut definitions, body) = f(reference(name).build()).split();
    definitions.insert(name, body);

    Schema::join(
        definitions,
        SubSchema::Ref {
            metadata: Default::default(),
            ref_: definition_ref(name),
        },
    )
}

/// Defers construction of a body until it is needed.
pub fn lazy<F>(f: F) -> Schema
where
    F: Fn() -> SubSchema + Send + Sync + 'static,
{
    SubSchema::Lazy(Thunk::new(f)).into()
}

/// Sets the title of any typed schema; `Lazy` and `Fallback` nodes are
/// returned unchanged.
pub fn with_title(schema: impl Into<Schema>, title: impl Into<String>) -> Schema {
    let mut schema = schema.into();
    if let Some(metadata) = schema.body.metadata_mut() {
        metadata.title = Some(title.into());
    }
    schema
}
