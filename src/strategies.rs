//! Proptest strategies for schemas, shared by the round-trip and
//! generator/validator property tests.

use crate::schema::{definition_ref, Definitions, Metadata, Property, Schema, StringFormat, SubSchema};
use proptest::collection::{btree_map, vec};
use proptest::option;
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_example() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i32>().prop_map(Value::from),
        "[a-z]{0,4}".prop_map(Value::from),
    ]
}

fn arb_metadata() -> impl Strategy<Value = Metadata> {
    (
        option::of("[a-z ]{0,8}"),
        option::of("[a-z ]{0,12}"),
        vec(arb_example(), 0..2),
    )
        .prop_map(|(title, description, examples)| Metadata {
            title,
            description,
            examples,
        })
}

fn arb_format() -> impl Strategy<Value = StringFormat> {
    prop_oneof![
        Just(StringFormat::DateTime),
        Just(StringFormat::Email),
        Just(StringFormat::Hostname),
        Just(StringFormat::Ipv4),
        Just(StringFormat::Ipv6),
        Just(StringFormat::Uri),
        "x-[a-z]{1,5}".prop_map(StringFormat::Custom),
    ]
}

/// An object that none of the typed decoders recognise.
fn arb_fallback() -> impl Strategy<Value = SubSchema> {
    ("x-[a-z]{1,5}", any::<i32>()).prop_map(|(key, n)| SubSchema::Fallback(json!({ key: n })))
}

/// Swaps a pair of bounds so that the lower one never exceeds the upper one.
fn ordered<T: PartialOrd>(bounds: (Option<T>, Option<T>)) -> (Option<T>, Option<T>) {
    match bounds {
        (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
        other => other,
    }
}

fn arb_u64_bounds(limit: u64) -> impl Strategy<Value = (Option<u64>, Option<u64>)> {
    (option::of(0..limit), option::of(0..limit)).prop_map(ordered)
}

fn arb_i64_bounds() -> impl Strategy<Value = (Option<i64>, Option<i64>)> {
    (option::of(any::<i64>()), option::of(any::<i64>())).prop_map(ordered)
}

fn arb_small_i64_bounds() -> impl Strategy<Value = (Option<i64>, Option<i64>)> {
    (option::of(-8i64..8), option::of(-8i64..8)).prop_map(ordered)
}

fn arb_f64_bounds(limit: f64) -> impl Strategy<Value = (Option<f64>, Option<f64>)> {
    (option::of(-limit..limit), option::of(-limit..limit)).prop_map(ordered)
}

fn properties(members: std::collections::BTreeMap<String, (bool, SubSchema)>) -> Vec<Property> {
    members
        .into_iter()
        .map(|(name, (required, schema))| Property {
            name,
            required,
            schema,
        })
        .collect()
}

fn arb_leaf() -> impl Strategy<Value = SubSchema> {
    prop_oneof![
        (
            arb_metadata(),
            option::of(vec("[a-z]{0,4}", 0..3)),
            arb_u64_bounds(12),
            option::of("[a-z^$.]{1,4}"),
            option::of(arb_format()),
        )
            .prop_map(|(metadata, enum_, (min_length, max_length), pattern, format)| {
                SubSchema::String {
                    metadata,
                    enum_,
                    min_length,
                    max_length,
                    pattern,
                    format,
                }
            }),
        (
            arb_metadata(),
            option::of(vec(any::<i64>(), 0..3)),
            arb_i64_bounds()
        )
            .prop_map(|(metadata, enum_, (minimum, maximum))| SubSchema::Integer {
                metadata,
                enum_,
                minimum,
                maximum,
            }),
        (
            arb_metadata(),
            option::of(vec(-1e6..1e6f64, 0..3)),
            arb_f64_bounds(1e6)
        )
            .prop_map(|(metadata, enum_, (minimum, maximum))| SubSchema::Number {
                metadata,
                enum_,
                minimum,
                maximum,
            }),
        (arb_metadata(), option::of(vec(any::<bool>(), 0..3)))
            .prop_map(|(metadata, enum_)| SubSchema::Boolean { metadata, enum_ }),
        arb_metadata().prop_map(|metadata| SubSchema::Null { metadata }),
        (arb_metadata(), "[a-z]{1,5}").prop_map(|(metadata, name)| SubSchema::Ref {
            metadata,
            ref_: definition_ref(&name),
        }),
        arb_fallback(),
    ]
}

/// Any schema this crate can build, except `Lazy` nodes (which encode as
/// their forced body and so cannot read back as `Lazy`).
pub fn arb_sub_schema() -> impl Strategy<Value = SubSchema> {
    arb_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (
                arb_metadata(),
                btree_map("[a-zA-Z]{1,6}", (any::<bool>(), inner.clone()), 0..4),
                arb_u64_bounds(6),
            )
                .prop_map(|(metadata, members, (min_properties, max_properties))| {
                    SubSchema::Object {
                        metadata,
                        properties: properties(members),
                        min_properties,
                        max_properties,
                    }
                }),
            (
                arb_metadata(),
                option::of(inner.clone()),
                arb_u64_bounds(6)
            )
                .prop_map(|(metadata, items, (min_items, max_items))| SubSchema::Array {
                    metadata,
                    items: items.map(Box::new),
                    min_items,
                    max_items,
                }),
            (
                arb_metadata(),
                option::of(vec(inner.clone(), 0..3)),
                option::of(inner.clone()),
                arb_u64_bounds(6),
            )
                .prop_map(|(metadata, items, additional_items, (min_items, max_items))| {
                    SubSchema::Tuple {
                        metadata,
                        items,
                        additional_items: additional_items.map(Box::new),
                        min_items,
                        max_items,
                    }
                }),
            (arb_metadata(), vec(inner.clone(), 0..3))
                .prop_map(|(metadata, sub_schemas)| SubSchema::OneOf {
                    metadata,
                    sub_schemas,
                }),
            (arb_metadata(), vec(inner.clone(), 0..3))
                .prop_map(|(metadata, sub_schemas)| SubSchema::AnyOf {
                    metadata,
                    sub_schemas,
                }),
            (arb_metadata(), vec(inner, 0..3)).prop_map(|(metadata, sub_schemas)| {
                SubSchema::AllOf {
                    metadata,
                    sub_schemas,
                }
            }),
        ]
    })
}

pub fn arb_schema() -> impl Strategy<Value = Schema> {
    (btree_map("[a-z]{1,5}", arb_sub_schema(), 0..3), arb_sub_schema()).prop_map(
        |(definitions, body)| Schema::join(definitions.into_iter().collect::<Definitions>(), body),
    )
}

fn arb_fuzzable_leaf() -> impl Strategy<Value = SubSchema> {
    prop_oneof![
        (
            arb_metadata(),
            option::of(vec("[a-z]{0,4}", 1..3)),
            arb_u64_bounds(8),
            option::of(arb_format()),
        )
            .prop_map(|(metadata, enum_, (min_length, max_length), format)| {
                SubSchema::String {
                    metadata,
                    enum_,
                    min_length,
                    max_length,
                    pattern: None,
                    format,
                }
            }),
        prop_oneof![
            (vec(-8i64..8, 1..4), arb_small_i64_bounds())
                .prop_map(|(values, bounds)| (Some(values), bounds)),
            arb_i64_bounds().prop_map(|bounds| (None::<Vec<i64>>, bounds)),
        ]
        .prop_map(|(enum_, (minimum, maximum))| SubSchema::Integer {
            metadata: Default::default(),
            enum_,
            minimum,
            maximum,
        }),
        prop_oneof![
            (vec(-8.0..8.0f64, 1..4), arb_f64_bounds(8.0))
                .prop_map(|(values, bounds)| (Some(values), bounds)),
            arb_f64_bounds(1e6).prop_map(|bounds| (None::<Vec<f64>>, bounds)),
        ]
        .prop_map(|(enum_, (minimum, maximum))| SubSchema::Number {
            metadata: Default::default(),
            enum_,
            minimum,
            maximum,
        }),
        option::of(vec(any::<bool>(), 1..3)).prop_map(|enum_| SubSchema::Boolean {
            metadata: Default::default(),
            enum_,
        }),
        Just(SubSchema::Null {
            metadata: Default::default()
        }),
        arb_fallback(),
    ]
}

/// Schemas the generator supports, apart from enums whose members may all
/// fall outside their bounds: no `$ref`, `oneOf`, `allOf`, object property
/// bounds, patterns, or empty ranges.
pub fn arb_fuzzable_schema() -> impl Strategy<Value = Schema> {
    arb_fuzzable_leaf()
        .prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                btree_map("[a-z]{1,6}", (any::<bool>(), inner.clone()), 0..4).prop_map(
                    |members| SubSchema::Object {
                        metadata: Default::default(),
                        properties: properties(members),
                        min_properties: None,
                        max_properties: None,
                    }
                ),
                (option::of(inner.clone()), arb_u64_bounds(6)).prop_map(
                    |(items, (min_items, max_items))| SubSchema::Array {
                        metadata: Default::default(),
                        items: items.map(Box::new),
                        min_items,
                        max_items,
                    }
                ),
                (
                    option::of(vec(inner.clone(), 0..3)),
                    option::of(inner.clone()),
                    arb_u64_bounds(6),
                )
                    .prop_map(|(items, additional_items, (min_items, max_items))| {
                        SubSchema::Tuple {
                            metadata: Default::default(),
                            items,
                            additional_items: additional_items.map(Box::new),
                            min_items,
                            max_items,
                        }
                    }),
                vec(inner, 1..3).prop_map(|sub_schemas| SubSchema::AnyOf {
                    metadata: Default::default(),
                    sub_schemas,
                }),
            ]
        })
        .prop_map(Schema::from)
}
