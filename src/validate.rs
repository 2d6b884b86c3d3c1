//! Checking JSON values against a [`Schema`].
//!
//! Validation never stops at the first problem. Every check at a node runs
//! before the validator descends into that node's children, and every failure
//! is reported together with a [`Pointer`] to the offending part of the input.

use crate::schema::{Definitions, Schema, SubSchema};
use regex::Regex;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A path into a JSON value: property names and stringified array indices.
/// The empty pointer is the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pointer(Vec<String>);

impl Pointer {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> From<Vec<S>> for Pointer {
    fn from(tokens: Vec<S>) -> Self {
        Self(tokens.into_iter().map(Into::into).collect())
    }
}

/// Formats as an RFC 6901 JSON Pointer.
impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.0 {
            write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
        }

        Ok(())
    }
}

/// What went wrong at a given [`Pointer`].
///
/// For `oneOf`, zero matching sub-schemas is reported as
/// [`ErrorMessage::TooFewMatches`] and two or more as
/// [`ErrorMessage::TooManyMatches`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ErrorMessage {
    #[error("is shorter than {0} characters")]
    IsShorterThan(u64),

    #[error("is longer than {0} characters")]
    IsLongerThan(u64),

    #[error("does not match pattern {0:?}")]
    DoesNotMatchPattern(String),

    #[error("is not one of the enumerated values")]
    NotInEnumeration,

    #[error("is missing required property {0:?}")]
    RequiredPropertyMissing(String),

    #[error("has fewer than {0} items")]
    HasFewerItemsThan(u64),

    #[error("has more than {0} items")]
    HasMoreItemsThan(u64),

    #[error("is less than {0}")]
    IsLessThan(f64),

    #[error("is more than {0}")]
    IsMoreThan(f64),

    #[error("matches more than one schema")]
    TooManyMatches,

    #[error("does not match enough schemas")]
    TooFewMatches,

    #[error("{0}")]
    DecodeError(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationError {
    pub pointer: Pointer,
    pub message: ErrorMessage,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pointer.is_root() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.pointer, self.message)
        }
    }
}

/// Validation aborted before it could produce a complete list of errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidateError {
    /// More than [`Validator::max_depth`] `$ref` or lazy indirections were
    /// followed along one path into the instance.
    #[error("max depth exceeded")]
    MaxDepthExceeded,
}

/// Validation settings.
///
/// The default follows references without limit and lets unresolved
/// references accept any value. Either way, a `$ref` that leads back to
/// itself before reaching a nested value is reported as an
/// [`ErrorMessage::DecodeError`] instead of being followed again.
#[derive(Clone, Debug, Default)]
pub struct Validator {
    /// How many `$ref`/lazy indirections may be nested before giving up.
    pub max_depth: Option<usize>,

    /// Report an unresolved `$ref` as a [`ErrorMessage::DecodeError`]
    /// instead of accepting the value.
    pub strict_refs: bool,
}

impl Validator {
    pub fn validate(
        &self,
        schema: &Schema,
        instance: &Value,
    ) -> Result<Vec<ValidationError>, ValidateError> {
        let regexes = RegexCache::default();
        let mut vm = Vm::new(self, &schema.definitions, &regexes);
        vm.validate(&schema.body, instance)?;
        Ok(vm.errors)
    }
}

/// Validates `instance` with the default [`Validator`].
///
/// An empty result means the instance is valid.
pub fn validate(schema: &Schema, instance: &Value) -> Vec<ValidationError> {
    match Validator::default().validate(schema, instance) {
        Ok(errors) => errors,
        Err(err) => vec![ValidationError {
            pointer: Pointer::root(),
            message: ErrorMessage::DecodeError(err.to_string()),
        }],
    }
}

// Nested `Lazy` nodes followed without descending into the instance, beyond
// which the schema is reported as never reaching a concrete type.
const MAX_LAZY_CHAIN: usize = 32;

/// Compiled `pattern`s, shared by every node of one validation run.
type RegexCache = RefCell<HashMap<String, Result<Regex, regex::Error>>>;

struct Vm<'a> {
    config: &'a Validator,
    definitions: &'a Definitions,
    regexes: &'a RegexCache,
    instance_tokens: Vec<String>,
    errors: Vec<ValidationError>,
    depth: usize,

    // Indirections followed since the last descent into a child value.
    pending_refs: Vec<String>,
    pending_lazies: usize,
}

impl<'a> Vm<'a> {
    fn new(config: &'a Validator, definitions: &'a Definitions, regexes: &'a RegexCache) -> Self {
        Self {
            config,
            definitions,
            regexes,
            instance_tokens: Vec::new(),
            errors: Vec::new(),
            depth: 0,
            pending_refs: Vec::new(),
            pending_lazies: 0,
        }
    }

    fn push_error(&mut self, message: ErrorMessage) {
        self.errors.push(ValidationError {
            pointer: Pointer(self.instance_tokens.clone()),
            message,
        });
    }

    fn push_decode_error(&mut self, expected: &str, instance: &Value) {
        self.push_error(ErrorMessage::DecodeError(format!(
            "expected {}, found {}",
            expected,
            describe(instance)
        )));
    }

    /// Whether `instance` satisfies `sub_schema`, discarding the details.
    fn matches(&self, sub_schema: &SubSchema, instance: &Value) -> Result<bool, ValidateError> {
        let mut probe = Vm::new(self.config, self.definitions, self.regexes);
        probe.depth = self.depth;
        probe.pending_refs = self.pending_refs.clone();
        probe.pending_lazies = self.pending_lazies;

        probe.validate(sub_schema, instance)?;
        Ok(probe.errors.is_empty())
    }

    fn validate_child(
        &mut self,
        token: String,
        sub_schema: &SubSchema,
        instance: &Value,
    ) -> Result<(), ValidateError> {
        let pending_refs = std::mem::take(&mut self.pending_refs);
        let pending_lazies = std::mem::replace(&mut self.pending_lazies, 0);

        self.instance_tokens.push(token);
        self.validate(sub_schema, instance)?;
        self.instance_tokens.pop();

        self.pending_refs = pending_refs;
        self.pending_lazies = pending_lazies;
        Ok(())
    }

    fn regex(&self, pattern: &str) -> Result<Regex, regex::Error> {
        self.regexes
            .borrow_mut()
            .entry(pattern.to_owned())
            .or_insert_with(|| Regex::new(pattern))
            .clone()
    }

    fn follow(&mut self, sub_schema: &SubSchema, instance: &Value) -> Result<(), ValidateError> {
        if let Some(max_depth) = self.config.max_depth {
            if self.depth >= max_depth {
                tracing::debug!(max_depth, "giving up on deeply nested references");
                return Err(ValidateError::MaxDepthExceeded);
            }
        }

        self.depth += 1;
        self.validate(sub_schema, instance)?;
        self.depth -= 1;
        Ok(())
    }

    fn check_item_count(&mut self, len: usize, min_items: Option<u64>, max_items: Option<u64>) {
        let len = len as u64;

        if let Some(min) = min_items {
            if len < min {
                self.push_error(ErrorMessage::HasFewerItemsThan(min));
            }
        }

        if let Some(max) = max_items {
            if len > max {
                self.push_error(ErrorMessage::HasMoreItemsThan(max));
            }
        }
    }

    fn validate(&mut self, sub_schema: &SubSchema, instance: &Value) -> Result<(), ValidateError> {
        match sub_schema {
            SubSchema::Object {
                properties,
                min_properties,
                max_properties,
                ..
            } => {
                let members = match instance.as_object() {
                    Some(members) => members,
                    None => {
                        self.push_decode_error("an object", instance);
                        return Ok(());
                    }
                };

                for property in properties {
                    if property.required && !members.contains_key(&property.name) {
                        self.push_error(ErrorMessage::RequiredPropertyMissing(
                            property.name.clone(),
                        ));
                    }
                }

                self.check_item_count(members.len(), *min_properties, *max_properties);

                for property in properties {
                    if let Some(value) = members.get(&property.name) {
                        self.validate_child(property.name.clone(), &property.schema, value)?;
                    }
                }
            }

            SubSchema::Array {
                items,
                min_items,
                max_items,
                ..
            } => {
                let elements = match instance.as_array() {
                    Some(elements) => elements,
                    None => {
                        self.push_decode_error("an array", instance);
                        return Ok(());
                    }
                };

                self.check_item_count(elements.len(), *min_items, *max_items);

                if let Some(items) = items {
                    for (index, element) in elements.iter().enumerate() {
                        self.validate_child(index.to_string(), items, element)?;
                    }
                }
            }

            SubSchema::Tuple {
                items,
                additional_items,
                min_items,
                max_items,
                ..
            } => {
                let elements = match instance.as_array() {
                    Some(elements) => elements,
                    None => {
                        self.push_decode_error("an array", instance);
                        return Ok(());
                    }
                };

                self.check_item_count(elements.len(), *min_items, *max_items);

                let positional = items.as_deref().unwrap_or(&[]);
                for (index, element) in elements.iter().enumerate() {
                    let item_schema = positional.get(index).or(additional_items.as_deref());
                    if let Some(item_schema) = item_schema {
                        self.validate_child(index.to_string(), item_schema, element)?;
                    }
                }
            }

            SubSchema::String {
                enum_,
                min_length,
                max_length,
                pattern,
                ..
            } => {
                let s = match instance.as_str() {
                    Some(s) => s,
                    None => {
                        self.push_decode_error("a string", instance);
                        return Ok(());
                    }
                };

                let len = s.chars().count() as u64;

                if let Some(min) = min_length {
                    if len < *min {
                        self.push_error(ErrorMessage::IsShorterThan(*min));
                    }
                }

                if let Some(max) = max_length {
                    if len > *max {
                        self.push_error(ErrorMessage::IsLongerThan(*max));
                    }
                }

                if let Some(pattern) = pattern {
                    match self.regex(pattern) {
                        Ok(regex) => {
                            if !regex.is_match(s) {
                                self.push_error(ErrorMessage::DoesNotMatchPattern(pattern.clone()));
                            }
                        }
                        Err(err) => {
                            self.push_error(ErrorMessage::DecodeError(format!(
                                "invalid pattern {:?}: {}",
                                pattern, err
                            )));
                        }
                    }
                }

                if let Some(values) = enum_ {
                    if !values.iter().any(|value| value == s) {
                        self.push_error(ErrorMessage::NotInEnumeration);
                    }
                }
            }

            SubSchema::Integer {
                enum_,
                minimum,
                maximum,
                ..
            } => {
                let n = match as_integer(instance) {
                    Some(n) => n,
                    None => {
                        self.push_decode_error("an integer", instance);
                        return Ok(());
                    }
                };

                if let Some(values) = enum_ {
                    if !values.contains(&n) {
                        self.push_error(ErrorMessage::NotInEnumeration);
                    }
                }

                if let Some(min) = minimum {
                    if (n as f64) < (*min as f64) {
                        self.push_error(ErrorMessage::IsLessThan(*min as f64));
                    }
                }

                if let Some(max) = maximum {
                    if (n as f64) > (*max as f64) {
                        self.push_error(ErrorMessage::IsMoreThan(*max as f64));
                    }
                }
            }

            SubSchema::Number {
                enum_,
                minimum,
                maximum,
                ..
            } => {
                let n = match instance.as_f64() {
                    Some(n) => n,
                    None => {
                        self.push_decode_error("a number", instance);
                        return Ok(());
                    }
                };

                if let Some(values) = enum_ {
                    if !values.contains(&n) {
                        self.push_error(ErrorMessage::NotInEnumeration);
                    }
                }

                if let Some(min) = minimum {
                    if n < *min {
                        self.push_error(ErrorMessage::IsLessThan(*min));
                    }
                }

                if let Some(max) = maximum {
                    if n > *max {
                        self.push_error(ErrorMessage::IsMoreThan(*max));
                    }
                }
            }

            SubSchema::Boolean { enum_, .. } => {
                let b = match instance.as_bool() {
                    Some(b) => b,
                    None => {
                        self.push_decode_error("a boolean", instance);
                        return Ok(());
                    }
                };

                if let Some(values) = enum_ {
                    if !values.contains(&b) {
                        self.push_error(ErrorMessage::NotInEnumeration);
                    }
                }
            }

            SubSchema::Null { .. } => {
                if !instance.is_null() {
                    self.push_decode_error("null", instance);
                }
            }

            SubSchema::Ref { ref_, .. } if self.pending_refs.contains(ref_) => {
                self.push_error(ErrorMessage::DecodeError(format!(
                    "reference cycle through {}",
                    ref_
                )));
            }

            SubSchema::Ref { ref_, .. } => match Definitions::resolve(self.definitions, ref_) {
                Some(body) => {
                    self.pending_refs.push(ref_.clone());
                    self.follow(body, instance)?;
                    self.pending_refs.pop();
                }
                None if self.config.strict_refs => {
                    self.push_error(ErrorMessage::DecodeError(format!(
                        "unresolved reference {}",
                        ref_
                    )));
                }
                None => {
                    tracing::debug!(%ref_, "unresolved reference accepts any value");
                }
            },

            SubSchema::OneOf { sub_schemas, .. } => {
                let mut matched = 0;
                for sub_schema in sub_schemas {
                    if self.matches(sub_schema, instance)? {
                        matched += 1;
                    }
                }

                match matched {
                    0 => self.push_error(ErrorMessage::TooFewMatches),
                    1 => {}
                    _ => self.push_error(ErrorMessage::TooManyMatches),
                }
            }

            SubSchema::AnyOf { sub_schemas, .. } => {
                let mut matched = false;
                for sub_schema in sub_schemas {
                    if self.matches(sub_schema, instance)? {
                        matched = true;
                        break;
                    }
                }

                if !matched {
                    self.push_error(ErrorMessage::TooFewMatches);
                }
            }

            SubSchema::AllOf { sub_schemas, .. } => {
                for sub_schema in sub_schemas {
                    if !self.matches(sub_schema, instance)? {
                        self.push_error(ErrorMessage::TooFewMatches);
                    }
                }
            }

            SubSchema::Lazy(_) if self.pending_lazies >= MAX_LAZY_CHAIN => {
                self.push_error(ErrorMessage::DecodeError(
                    "lazy schema never reaches a concrete type".to_owned(),
                ));
            }

            SubSchema::Lazy(thunk) => {
                self.pending_lazies += 1;
                self.follow(&thunk.force(), instance)?;
                self.pending_lazies -= 1;
            }

            SubSchema::Fallback(_) => {}
        }

        Ok(())
    }
}

/// Integers may arrive as floats with no fractional part, e.g. `2.0`.
fn as_integer(instance: &Value) -> Option<i64> {
    if let Some(n) = instance.as_i64() {
        return Some(n);
    }

    let f = instance.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn describe(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
