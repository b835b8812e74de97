//! Declarative request/response shapes.
//!
//! A [`Shape`] lists the fields a provider recognizes. Validation keeps only
//! those fields, fills declared defaults and reports every offending field
//! in one [`ValidationFailure`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{FieldIssue, ValidationFailure};

/// Field name used for issues that concern the whole input.
pub const ROOT_FIELD: &str = "__root__";

/// Accepted JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    /// JSON object whose values are all strings.
    StringMap,
    Any,
}

impl FieldType {
    const fn expectation(self) -> &'static str {
        match self {
            Self::String => "Input should be a valid string",
            Self::Integer => "Input should be a valid integer",
            Self::Number => "Input should be a valid number",
            Self::Boolean => "Input should be a valid boolean",
            Self::Object | Self::StringMap => "Input should be a valid dictionary",
            Self::Any => "Input should be present",
        }
    }

    fn check(self, field: &str, value: &Value, issues: &mut Vec<FieldIssue>) {
        let accepted = match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::StringMap => {
                let Some(map) = value.as_object() else {
                    issues.push(FieldIssue::new(field, self.expectation()));
                    return;
                };
                for (key, entry) in map {
                    if !entry.is_string() {
                        issues.push(FieldIssue::new(
                            format!("{field}.{key}"),
                            Self::String.expectation(),
                        ));
                    }
                }
                return;
            }
            Self::Any => true,
        };

        if !accepted {
            issues.push(FieldIssue::new(field, self.expectation()));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FieldSpec {
    name: &'static str,
    field_type: FieldType,
    required: bool,
    default: Option<Value>,
}

/// Ordered set of recognized fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    fields: Vec<FieldSpec>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.fields.push(FieldSpec {
            name,
            field_type,
            required: true,
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.fields.push(FieldSpec {
            name,
            field_type,
            required: false,
            default: None,
        });
        self
    }

    /// Optional field that takes `default` when absent or null.
    pub fn with_default(
        mut self,
        name: &'static str,
        field_type: FieldType,
        default: Value,
    ) -> Self {
        self.fields.push(FieldSpec {
            name,
            field_type,
            required: false,
            default: Some(default),
        });
        self
    }

    /// Validate an arbitrary JSON value, which must be an object.
    pub fn validate(&self, input: &Value) -> Result<Map<String, Value>, ValidationFailure> {
        match input {
            Value::Object(map) => self.validate_map(map),
            _ => Err(ValidationFailure::single(FieldIssue::new(
                ROOT_FIELD,
                FieldType::Object.expectation(),
            ))),
        }
    }

    /// Validate a mapping and return the normalized copy.
    ///
    /// Unrecognized keys are dropped silently. Null counts as absent for
    /// optional fields.
    pub fn validate_map(
        &self,
        input: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationFailure> {
        let mut normalized = Map::new();
        let mut issues = Vec::new();

        for field in &self.fields {
            match input.get(field.name) {
                None => {
                    if field.required {
                        issues.push(FieldIssue::missing(field.name));
                    } else if let Some(default) = &field.default {
                        normalized.insert(field.name.to_owned(), default.clone());
                    }
                }
                Some(Value::Null) if !field.required => {
                    if let Some(default) = &field.default {
                        normalized.insert(field.name.to_owned(), default.clone());
                    }
                }
                Some(value) => {
                    let before = issues.len();
                    field.field_type.check(field.name, value, &mut issues);
                    if issues.len() == before {
                        normalized.insert(field.name.to_owned(), value.clone());
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(normalized)
        } else {
            Err(ValidationFailure::new(issues))
        }
    }

    /// Validate `input` and deserialize the normalized mapping into `T`.
    pub fn parse<T: DeserializeOwned>(&self, input: &Value) -> Result<T, ValidationFailure> {
        let normalized = self.validate(input)?;
        deserialize(normalized)
    }

    pub fn parse_map<T: DeserializeOwned>(
        &self,
        input: &Map<String, Value>,
    ) -> Result<T, ValidationFailure> {
        let normalized = self.validate_map(input)?;
        deserialize(normalized)
    }
}

fn deserialize<T: DeserializeOwned>(
    normalized: Map<String, Value>,
) -> Result<T, ValidationFailure> {
    serde_json::from_value(Value::Object(normalized)).map_err(|error| {
        ValidationFailure::single(FieldIssue::new(ROOT_FIELD, error.to_string()))
    })
}
