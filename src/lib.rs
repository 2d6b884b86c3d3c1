//! Build, encode, validate, and generate example data from JSON Schema
//! documents.
//!
//! This crate understands a draft-4-like subset of JSON Schema: `type`,
//! `properties`/`required`, `items`/`additionalItems`, length and numeric
//! bounds, `pattern`, `format`, `enum`, `$ref` into root `definitions`, and
//! the `oneOf`/`anyOf`/`allOf` combinators. Anything else decodes into an
//! opaque [`SubSchema::Fallback`] that accepts every value.
//!
//! # Quick start
//!
//! Here's how you can decode a schema, check some data against it, and
//! generate more data that satisfies it.
//!
//! ```
//! use serde_json::json;
//! use rand::SeedableRng;
//! use json_schema_fuzz::{ErrorMessage, Pointer};
//!
//! let schema = json_schema_fuzz::decode(r#"{
//!     "type": "object",
//!     "properties": {
//!         "name": { "type": "string", "minLength": 1 },
//!         "favoriteNumbers": {
//!             "type": "array",
//!             "items": { "type": "integer", "minimum": 0, "maximum": 255 }
//!         }
//!     },
//!     "required": ["name"]
//! }"#).unwrap();
//!
//! let errors = json_schema_fuzz::validate(&schema, &json!({ "favoriteNumbers": [1, 256] }));
//! assert_eq!(errors.len(), 2);
//! assert_eq!(errors[0].message, ErrorMessage::RequiredPropertyMissing("name".to_owned()));
//! assert_eq!(errors[1].pointer, Pointer::from(vec!["favoriteNumbers", "1"]));
//! assert_eq!(errors[1].message, ErrorMessage::IsMoreThan(255.0));
//!
//! // A hard-coded RNG, so that the output is predictable.
//! let mut rng = rand_pcg::Pcg32::seed_from_u64(8927);
//!
//! for _ in 0..100 {
//!     let value = json_schema_fuzz::fuzz(&schema, &mut rng).unwrap();
//!     assert!(json_schema_fuzz::validate(&schema, &value).is_empty());
//! }
//! ```
//!
//! # Generator limitations
//!
//! [`fuzz`] refuses, with a [`FuzzError`], schemas containing `$ref`,
//! `oneOf`, `allOf`, or objects with `minProperties`/`maxProperties`. It also
//! refuses enums with no member inside the node's bounds, non-finite number
//! bounds, and recursive `Lazy` schemas that require themselves at every
//! level. It does not try to satisfy `pattern` or `format`.

pub mod builder;
pub mod fuzz;
pub mod schema;
pub mod validate;
pub mod wire;

#[cfg(test)]
mod strategies;

pub use crate::fuzz::{fuzz, FuzzError, Fuzzer};
pub use crate::schema::{Definitions, Metadata, Property, Schema, StringFormat, SubSchema};
pub use crate::validate::{validate, ErrorMessage, Pointer, ValidateError, ValidationError, Validator};
pub use crate::wire::{decode, encode, DecodeError};
