//! Conversion between [`Schema`] and its JSON Schema wire form.
//!
//! [`SerdeSchema`] is a serde-friendly mirror of a single wire node. Its
//! nested schemas are kept as raw [`Value`]s so that a malformed child decodes
//! into its own [`SubSchema::Fallback`] instead of spoiling its parent.

use crate::schema::{Definitions, Metadata, Property, Schema, StringFormat, SubSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

// How many nested `Lazy` nodes are forced while encoding. Deeper ones encode
// as the empty schema `{}`.
const MAX_LAZY_DEPTH: usize = 8;

/// The only way decoding can fail: the input is not JSON at all.
#[derive(Debug, Error)]
#[error("schema is not well-formed JSON: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerdeSchema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_items: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Value>>,
}

/// Parses wire text into a schema. Fails only on malformed JSON.
pub fn decode(input: &str) -> Result<Schema, DecodeError> {
    Ok(from_value(serde_json::from_str(input)?))
}

/// Serializes a schema to pretty-printed wire text.
pub fn encode(schema: &Schema) -> String {
    // A Value has only string keys and finite numbers, so this cannot fail.
    serde_json::to_string_pretty(&to_value(schema)).unwrap_or_default()
}

/// Interprets a JSON value as a schema. Never fails: shapes that are not
/// understood become [`SubSchema::Fallback`].
pub fn from_value(mut value: Value) -> Schema {
    let mut definitions = Definitions::new();

    if let Value::Object(ref mut root) = value {
        if matches!(root.get("definitions"), Some(Value::Object(_))) {
            if let Some(Value::Object(defs)) = root.remove("definitions") {
                for (name, body) in defs {
                    definitions.insert(name, sub_schema_from_value(body));
                }
            }
        }
    }

    Schema::join(definitions, sub_schema_from_value(value))
}

/// Converts a schema to its wire form. Root definitions are emitted under
/// `"definitions"`, keyed by local name.
pub fn to_value(schema: &Schema) -> Value {
    let mut value = sub_schema_to_value(&schema.body);

    if !schema.definitions.is_empty() {
        match value {
            Value::Object(ref mut root) => {
                let defs = schema
                    .definitions
                    .iter()
                    .map(|(name, body)| (name.clone(), sub_schema_to_value(body)))
                    .collect::<Map<String, Value>>();
                root.insert("definitions".to_owned(), Value::Object(defs));
            }
            _ => {
                tracing::debug!("root is not a JSON object, dropping its definitions");
            }
        }
    }

    value
}

pub fn sub_schema_from_value(value: Value) -> SubSchema {
    if !value.is_object() {
        return SubSchema::Fallback(value);
    }

    let serde_schema: SerdeSchema = match serde_json::from_value(value.clone()) {
        Ok(serde_schema) => serde_schema,
        Err(err) => {
            tracing::debug!(%err, "keywords have unexpected shapes, using fallback");
            return SubSchema::Fallback(value);
        }
    };

    match SubSchema::from_serde_schema(serde_schema) {
        Some(sub_schema) => sub_schema,
        None => {
            tracing::trace!(%value, "unrecognized schema shape, using fallback");
            SubSchema::Fallback(value)
        }
    }
}

pub fn sub_schema_to_value(sub_schema: &SubSchema) -> Value {
    value_at_depth(sub_schema, 0)
}

fn value_at_depth(sub_schema: &SubSchema, lazy_depth: usize) -> Value {
    match sub_schema {
        SubSchema::Fallback(value) => value.clone(),
        SubSchema::Lazy(_) if lazy_depth >= MAX_LAZY_DEPTH => {
            tracing::debug!(lazy_depth, "lazy schema nested too deeply, encoding as {{}}");
            Value::Object(Map::new())
        }
        SubSchema::Lazy(thunk) => value_at_depth(&thunk.force(), lazy_depth + 1),
        _ => serde_json::to_value(sub_schema.serde_at_depth(lazy_depth)).unwrap_or(Value::Null),
    }
}

impl SubSchema {
    /// Builds a typed node, or `None` if the wire node is not one this crate
    /// models.
    pub fn from_serde_schema(serde_schema: SerdeSchema) -> Option<Self> {
        let metadata = Metadata {
            title: serde_schema.title,
            description: serde_schema.description,
            examples: serde_schema.examples.unwrap_or_default(),
        };

        if let Some(ref_) = serde_schema.ref_ {
            return Some(SubSchema::Ref { metadata, ref_ });
        }

        if let Some(sub_schemas) = serde_schema.one_of {
            return Some(SubSchema::OneOf {
                metadata,
                sub_schemas: sub_schemas.into_iter().map(sub_schema_from_value).collect(),
            });
        }

        if let Some(sub_schemas) = serde_schema.any_of {
            return Some(SubSchema::AnyOf {
                metadata,
                sub_schemas: sub_schemas.into_iter().map(sub_schema_from_value).collect(),
            });
        }

        if let Some(sub_schemas) = serde_schema.all_of {
            return Some(SubSchema::AllOf {
                metadata,
                sub_schemas: sub_schemas.into_iter().map(sub_schema_from_value).collect(),
            });
        }

        match serde_schema.type_.as_deref()? {
            "object" => {
                let required = serde_schema.required.unwrap_or_default();
                let properties = serde_schema
                    .properties
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(name, value)| Property {
                        required: required.contains(&name),
                        schema: sub_schema_from_value(value),
                        name,
                    })
                    .collect();

                Some(SubSchema::Object {
                    metadata,
                    properties,
                    min_properties: serde_schema.min_properties,
                    max_properties: serde_schema.max_properties,
                })
            }

            "array" => match serde_schema.items {
                Some(Value::Array(items)) => Some(SubSchema::Tuple {
                    metadata,
                    items: Some(items.into_iter().map(sub_schema_from_value).collect()),
                    additional_items: additional_items_from_value(serde_schema.additional_items)?,
                    min_items: serde_schema.min_items,
                    max_items: serde_schema.max_items,
                }),

                None if serde_schema.additional_items.is_some() => Some(SubSchema::Tuple {
                    metadata,
                    items: None,
                    additional_items: additional_items_from_value(serde_schema.additional_items)?,
                    min_items: serde_schema.min_items,
                    max_items: serde_schema.max_items,
                }),

                items => Some(SubSchema::Array {
                    metadata,
                    items: items.map(|value| Box::new(sub_schema_from_value(value))),
                    min_items: serde_schema.min_items,
                    max_items: serde_schema.max_items,
                }),
            },

            "string" => {
                let enum_ = match serde_schema.enum_ {
                    Some(values) => Some(
                        values
                            .into_iter()
                            .map(|value| match value {
                                Value::String(s) => Some(s),
                                _ => None,
                            })
                            .collect::<Option<Vec<_>>>()?,
                    ),
                    None => None,
                };

                Some(SubSchema::String {
                    metadata,
                    enum_,
                    min_length: serde_schema.min_length,
                    max_length: serde_schema.max_length,
                    pattern: serde_schema.pattern,
                    format: serde_schema.format.as_deref().map(StringFormat::from),
                })
            }

            "integer" => {
                let enum_ = match serde_schema.enum_ {
                    Some(values) => Some(
                        values
                            .iter()
                            .map(Value::as_i64)
                            .collect::<Option<Vec<_>>>()?,
                    ),
                    None => None,
                };

                Some(SubSchema::Integer {
                    metadata,
                    enum_,
                    minimum: integer_bound(serde_schema.minimum)?,
                    maximum: integer_bound(serde_schema.maximum)?,
                })
            }

            "number" => {
                let enum_ = match serde_schema.enum_ {
                    Some(values) => Some(
                        values
                            .iter()
                            .map(Value::as_f64)
                            .collect::<Option<Vec<_>>>()?,
                    ),
                    None => None,
                };

                Some(SubSchema::Number {
                    metadata,
                    enum_,
                    minimum: serde_schema.minimum.as_ref().and_then(Number::as_f64),
                    maximum: serde_schema.maximum.as_ref().and_then(Number::as_f64),
                })
            }

            "boolean" => {
                let enum_ = match serde_schema.enum_ {
                    Some(values) => Some(
                        values
                            .iter()
                            .map(Value::as_bool)
                            .collect::<Option<Vec<_>>>()?,
                    ),
                    None => None,
                };

                Some(SubSchema::Boolean { metadata, enum_ })
            }

            "null" => Some(SubSchema::Null { metadata }),

            _ => None,
        }
    }

    /// The wire node for a typed node. `Lazy` is forced, up to a fixed
    /// nesting depth; `Fallback` has no typed wire form and yields an empty
    /// node.
    pub fn to_serde_schema(&self) -> SerdeSchema {
        self.serde_at_depth(0)
    }

    fn serde_at_depth(&self, lazy_depth: usize) -> SerdeSchema {
        let child = |sub_schema: &SubSchema| value_at_depth(sub_schema, lazy_depth);
        let mut out = SerdeSchema::default();

        if let Some(metadata) = self.metadata() {
            out.title = metadata.title.clone();
            out.description = metadata.description.clone();
            if !metadata.examples.is_empty() {
                out.examples = Some(metadata.examples.clone());
            }
        }

        match self {
            SubSchema::Object {
                properties,
                min_properties,
                max_properties,
                ..
            } => {
                out.type_ = Some("object".to_owned());
                out.properties = Some(
                    properties
                        .iter()
                        .map(|p| (p.name.clone(), child(&p.schema)))
                        .collect(),
                );

                let required: Vec<_> = properties
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name.clone())
                    .collect();
                if !required.is_empty() {
                    out.required = Some(required);
                }

                out.min_properties = *min_properties;
                out.max_properties = *max_properties;
            }

            SubSchema::Array {
                items,
                min_items,
                max_items,
                ..
            } => {
                out.type_ = Some("array".to_owned());
                out.items = items.as_deref().map(child);
                out.min_items = *min_items;
                out.max_items = *max_items;
            }

            SubSchema::Tuple {
                items,
                additional_items,
                min_items,
                max_items,
                ..
            } => {
                out.type_ = Some("array".to_owned());
                out.items = items
                    .as_ref()
                    .map(|items| Value::Array(items.iter().map(child).collect()));
                out.additional_items = match additional_items {
                    Some(schema) => Some(child(schema)),
                    // Without either keyword a tuple would read back as an array.
                    None if items.is_none() => Some(Value::Bool(true)),
                    None => None,
                };
                out.min_items = *min_items;
                out.max_items = *max_items;
            }

            SubSchema::String {
                enum_,
                min_length,
                max_length,
                pattern,
                format,
                ..
            } => {
                out.type_ = Some("string".to_owned());
                out.enum_ = enum_
                    .as_ref()
                    .map(|values| values.iter().cloned().map(Value::from).collect());
                out.min_length = *min_length;
                out.max_length = *max_length;
                out.pattern = pattern.clone();
                out.format = format.as_ref().map(|f| f.as_str().to_owned());
            }

            SubSchema::Integer {
                enum_,
                minimum,
                maximum,
                ..
            } => {
                out.type_ = Some("integer".to_owned());
                out.enum_ = enum_
                    .as_ref()
                    .map(|values| values.iter().copied().map(Value::from).collect());
                out.minimum = minimum.map(Number::from);
                out.maximum = maximum.map(Number::from);
            }

            SubSchema::Number {
                enum_,
                minimum,
                maximum,
                ..
            } => {
                out.type_ = Some("number".to_owned());
                out.enum_ = enum_
                    .as_ref()
                    .map(|values| values.iter().copied().map(Value::from).collect());
                out.minimum = minimum.and_then(Number::from_f64);
                out.maximum = maximum.and_then(Number::from_f64);
            }

            SubSchema::Boolean { enum_, .. } => {
                out.type_ = Some("boolean".to_owned());
                out.enum_ = enum_
                    .as_ref()
                    .map(|values| values.iter().copied().map(Value::from).collect());
            }

            SubSchema::Null { .. } => {
                out.type_ = Some("null".to_owned());
            }

            SubSchema::Ref { ref_, .. } => {
                out.ref_ = Some(ref_.clone());
            }

            SubSchema::OneOf { sub_schemas, .. } => {
                out.one_of = Some(sub_schemas.iter().map(child).collect());
            }

            SubSchema::AnyOf { sub_schemas, .. } => {
                out.any_of = Some(sub_schemas.iter().map(child).collect());
            }

            SubSchema::AllOf { sub_schemas, .. } => {
                out.all_of = Some(sub_schemas.iter().map(child).collect());
            }

            SubSchema::Lazy(_) if lazy_depth >= MAX_LAZY_DEPTH => {}

            SubSchema::Lazy(thunk) => return thunk.force().serde_at_depth(lazy_depth + 1),

            SubSchema::Fallback(_) => {}
        }

        out
    }
}

/// `additionalItems: true` means "anything goes", which is the same as
/// leaving it out. `false` is not modelled, so the outer `None` rejects the
/// node.
fn additional_items_from_value(value: Option<Value>) -> Option<Option<Box<SubSchema>>> {
    match value {
        None | Some(Value::Bool(true)) => Some(None),
        Some(Value::Bool(false)) => None,
        Some(value) => Some(Some(Box::new(sub_schema_from_value(value)))),
    }
}

/// An integer bound that is present but not a whole `i64` rejects the node.
fn integer_bound(bound: Option<Number>) -> Option<Option<i64>> {
    match bound {
        None => Some(None),
        Some(n) => n.as_i64().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use serde_json::json;

    fn assert_round_trip(schema: Schema) {
        assert_eq!(decode(&encode(&schema)).unwrap(), schema);
    }

    #[test]
    fn test_encode_object() {
        let schema = object()
            .title("person")
            .required("lastName", string().min_length(1))
            .optional("age", integer().minimum(0))
            .build();

        assert_eq!(
            to_value(&schema),
            json!({
                "type": "object",
                "title": "person",
                "properties": {
                    "lastName": { "type": "string", "minLength": 1 },
                    "age": { "type": "integer", "minimum": 0 },
                },
                "required": ["lastName"],
            })
        );
    }

    #[test]
    fn test_encode_definitions() {
        let schema = recurse("node", |node| array().items(node).build());

        assert_eq!(
            to_value(&schema),
            json!({
                "$ref": "#/definitions/node",
                "definitions": {
                    "node": {
                        "type": "array",
                        "items": { "$ref": "#/definitions/node" },
                    },
                },
            })
        );
    }

    #[test]
    fn test_encode_combinators_and_examples() {
        let schema = any_of(vec![string().build(), null().build()])
            .description("maybe a string")
            .examples(vec!["x"])
            .build();

        assert_eq!(
            to_value(&schema),
            json!({
                "description": "maybe a string",
                "examples": ["x"],
                "anyOf": [{ "type": "string" }, { "type": "null" }],
            })
        );
    }

    #[test]
    fn test_encode_lazy_forces_body() {
        let schema = lazy(|| SubSchema::Null {
            metadata: Default::default(),
        });

        assert_eq!(to_value(&schema), json!({ "type": "null" }));
    }

    #[test]
    fn test_encode_recursive_lazy_terminates() {
        fn tree() -> SubSchema {
            array().items(lazy(tree)).build().body
        }

        let mut value = to_value(&lazy(tree));
        let mut depth = 0;
        while let Some(items) = value.get("items") {
            value = items.clone();
            depth += 1;
        }

        assert_eq!(depth, MAX_LAZY_DEPTH);
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_round_trip() {
        assert_round_trip(object().build());
        assert_round_trip(
            object()
                .required("z", string().format(StringFormat::Email))
                .optional("a", number().minimum(0.5).maximum(2.0))
                .optional("m", boolean().enum_values(vec![true]))
                .min_properties(1)
                .max_properties(3)
                .build(),
        );
        assert_round_trip(array().build());
        assert_round_trip(array().items(null()).min_items(1).max_items(2).build());
        assert_round_trip(tuple().build());
        assert_round_trip(tuple().items(Vec::<Schema>::new()).build());
        assert_round_trip(tuple().additional_items(integer()).build());
        assert_round_trip(
            tuple()
                .items(vec![integer().build(), string().build(), number().build()])
                .additional_items(boolean())
                .max_items(2)
                .build(),
        );
        assert_round_trip(
            string()
                .enum_values(vec!["a", "b"])
                .pattern("^a")
                .format(StringFormat::Custom("x-phone".to_owned()))
                .build(),
        );
        assert_round_trip(integer().enum_values(vec![1, 2]).minimum(-3).maximum(8).build());
        assert_round_trip(one_of(vec![integer().build(), string().build()]).title("t").build());
        assert_round_trip(all_of(Vec::<Schema>::new()).build());
        assert_round_trip(recurse("tree", |tree| array().items(tree).build()));
        assert_round_trip(
            object()
                .required("a", string())
                .optional("a", integer())
                .build(),
        );
    }

    #[test]
    fn test_decode_unknown_shapes_as_fallback() {
        for value in vec![
            json!(true),
            json!({}),
            json!({ "type": "date" }),
            json!({ "type": ["string", "null"] }),
            json!({ "type": "string", "minLength": "three" }),
            json!({ "type": "string", "enum": [1] }),
            json!({ "type": "integer", "minimum": 1.5 }),
            json!({ "type": "array", "additionalItems": false }),
            json!({ "patternProperties": {} }),
        ] {
            assert_eq!(
                from_value(value.clone()),
                Schema::from(SubSchema::Fallback(value))
            );
        }
    }

    #[test]
    fn test_decode_nested_fallback() {
        let schema = from_value(json!({
            "type": "array",
            "items": { "type": "timestamp" },
        }));

        assert_eq!(
            schema.body,
            SubSchema::Array {
                metadata: Default::default(),
                items: Some(Box::new(SubSchema::Fallback(json!({ "type": "timestamp" })))),
                min_items: None,
                max_items: None,
            }
        );
    }

    #[test]
    fn test_decode_tuple_forms() {
        let schema = from_value(json!({
            "type": "array",
            "items": [{ "type": "null" }],
            "additionalItems": true,
        }));

        assert_eq!(
            schema.body,
            SubSchema::Tuple {
                metadata: Default::default(),
                items: Some(vec![SubSchema::Null {
                    metadata: Default::default()
                }]),
                additional_items: None,
                min_items: None,
                max_items: None,
            }
        );
    }

    #[test]
    fn test_decode_integral_number_bounds() {
        let schema = from_value(json!({ "type": "number", "minimum": 2, "enum": [1, 2.5] }));

        assert_eq!(
            schema.body,
            SubSchema::Number {
                metadata: Default::default(),
                enum_: Some(vec![1.0, 2.5]),
                minimum: Some(2.0),
                maximum: None,
            }
        );
    }

    #[test]
    fn test_decode_malformed_json() {
        assert!(decode("{ \"type\": ").is_err());
    }

    #[test]
    fn test_decode_fallback_root_keeps_definitions() {
        let schema = decode(r#"{ "x-custom": 1, "definitions": { "a": { "type": "null" } } }"#).unwrap();

        assert_eq!(schema.body, SubSchema::Fallback(json!({ "x-custom": 1 })));
        assert_eq!(schema.definitions.len(), 1);
        assert_round_trip(schema);
    }
}
