//! Resource schemas.
//!
//! A [`ResourceSchema`] names the fields of one resource type together with
//! their types and constraints. It is the single source of truth for payload
//! validation, default values, uniqueness constraints handed to the store,
//! and the query pipeline's value coercion.
//!
//! Violations are collected into [`validator::ValidationErrors`] so that a
//! payload with several bad fields reports all of them at once.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::document::format_timestamp;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    /// RFC 3339 timestamp or plain `YYYY-MM-DD` date.
    Timestamp,
    /// Identifier of a document in the named collection.
    Reference(&'static str),
    StringList,
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// Message reported when the field is missing; `None` means optional.
    pub required: Option<&'static str>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub unique: bool,
    /// Maintained by the server; never accepted from client payloads.
    pub managed: bool,
    pub filterable: bool,
    pub projectable: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: None,
            min: None,
            max: None,
            min_len: None,
            max_len: None,
            unique: false,
            managed: false,
            filterable: true,
            projectable: true,
            default: None,
        }
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_len = Some(min);
        self.max_len = Some(max);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    pub fn unfilterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    /// Leaves the field out of the default projection.
    pub fn hidden(mut self) -> Self {
        self.projectable = false;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Checks `value` against the field type and constraints, returning the
    /// normalized value to persist.
    pub fn check(&self, value: &Value) -> Result<Value, ValidationError> {
        if value.is_null() {
            return match self.required {
                Some(message) => Err(violation("required", message.to_string())),
                None => Ok(Value::Null),
            };
        }

        match &self.ty {
            FieldType::String => {
                let text = match value {
                    Value::String(s) => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(self.type_error("a string")),
                };
                self.check_length(&text)?;
                Ok(Value::String(text))
            }
            FieldType::Number | FieldType::Integer => {
                let number = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                }
                .filter(|n| n.is_finite())
                .ok_or_else(|| self.type_error("a number"))?;

                if self.ty == FieldType::Integer && number.fract() != 0.0 {
                    return Err(self.type_error("an integer"));
                }
                self.check_range(number)?;
                Ok(number_value(number))
            }
            FieldType::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) => parse_bool(s)
                    .map(Value::Bool)
                    .ok_or_else(|| self.type_error("a boolean")),
                _ => Err(self.type_error("a boolean")),
            },
            FieldType::Timestamp => value
                .as_str()
                .and_then(parse_timestamp)
                .map(|at| Value::String(format_timestamp(&at)))
                .ok_or_else(|| self.type_error("a date")),
            FieldType::Reference(_) => value
                .as_str()
                .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
                .map(|id| Value::String(id.to_string()))
                .ok_or_else(|| {
                    violation(
                        "reference",
                        format!("Invalid {}: {}", self.name, display_raw(value)),
                    )
                }),
            FieldType::StringList => match value {
                Value::String(s) => Ok(Value::Array(vec![Value::String(s.trim().to_string())])),
                Value::Array(items) => items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(|s| Value::String(s.trim().to_string()))
                            .ok_or_else(|| self.type_error("a list of strings"))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                _ => Err(self.type_error("a list of strings")),
            },
            FieldType::Enum(allowed) => match value.as_str().map(str::trim) {
                Some(s) if allowed.contains(&s) => Ok(Value::String(s.to_string())),
                _ => Err(violation(
                    "enum",
                    format!("{} must be one of: {}", self.name, allowed.join(", ")),
                )),
            },
        }
    }

    /// Coerces a query-string value to the field's type, falling back to
    /// the literal string when it does not parse.
    pub fn coerce_query_value(&self, raw: &str) -> Value {
        match self.ty {
            FieldType::Number | FieldType::Integer => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(number_value)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            FieldType::Boolean => parse_bool(raw)
                .map(Value::Bool)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            FieldType::Timestamp => parse_timestamp(raw)
                .map(|at| Value::String(format_timestamp(&at)))
                .unwrap_or_else(|| Value::String(raw.to_string())),
            _ => Value::String(raw.to_string()),
        }
    }

    fn check_range(&self, number: f64) -> Result<(), ValidationError> {
        let below = self.min.is_some_and(|min| number < min);
        let above = self.max.is_some_and(|max| number > max);
        if below || above {
            let message = match (self.min, self.max) {
                (Some(min), Some(max)) => {
                    format!("{} must be between {} and {}", self.name, min, max)
                }
                (Some(min), None) => format!("{} must be at least {}", self.name, min),
                (None, Some(max)) => format!("{} must be at most {}", self.name, max),
                (None, None) => unreachable!(),
            };
            return Err(violation("range", message));
        }
        Ok(())
    }

    fn check_length(&self, text: &str) -> Result<(), ValidationError> {
        let len = text.chars().count();
        let short = self.min_len.is_some_and(|min| len < min);
        let long = self.max_len.is_some_and(|max| len > max);
        if short || long {
            let message = format!(
                "{} must have between {} and {} characters",
                self.name,
                self.min_len.unwrap_or(0),
                self.max_len.map_or_else(|| "any".to_string(), |m| m.to_string())
            );
            return Err(violation("length", message));
        }
        if len == 0 {
            if let Some(message) = self.required {
                return Err(violation("required", message.to_string()));
            }
        }
        Ok(())
    }

    fn type_error(&self, expected: &str) -> ValidationError {
        violation("type", format!("{} must be {}", self.name, expected))
    }
}

#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
    pub unique_together: Vec<Vec<&'static str>>,
}

impl ResourceSchema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            unique_together: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn unique_together(mut self, fields: &[&'static str]) -> Self {
        self.unique_together.push(fields.to_vec());
        self
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every uniqueness constraint the store must enforce, single-field ones first.
    pub fn unique_constraints(&self) -> Vec<Vec<&'static str>> {
        self.fields
            .iter()
            .filter(|f| f.unique)
            .map(|f| vec![f.name])
            .chain(self.unique_together.iter().cloned())
            .collect()
    }

    /// Fields left out of the default projection.
    pub fn hidden_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| !f.projectable)
            .map(|f| f.name)
            .collect()
    }

    /// Validates a full payload for creation. Unknown keys are dropped,
    /// managed fields take their defaults, and every violation is reported.
    pub fn validate_create(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationErrors> {
        let mut out = Map::new();
        let mut errors = ValidationErrors::new();

        for spec in &self.fields {
            if spec.managed {
                if let Some(default) = &spec.default {
                    out.insert(spec.name.to_string(), default.clone());
                }
                continue;
            }

            match payload.get(spec.name) {
                None | Some(Value::Null) => {
                    if let Some(message) = spec.required {
                        errors.add(spec.name, violation("required", message.to_string()));
                    } else if let Some(default) = &spec.default {
                        out.insert(spec.name.to_string(), default.clone());
                    }
                }
                Some(value) => match spec.check(value) {
                    Ok(value) => {
                        out.insert(spec.name.to_string(), value);
                    }
                    Err(error) => errors.add(spec.name, error),
                },
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }

    /// Validates a partial update. Only the keys present are checked; unknown
    /// and managed keys are dropped.
    pub fn validate_patch(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationErrors> {
        let mut out = Map::new();
        let mut errors = ValidationErrors::new();

        for (key, value) in payload {
            let Some(spec) = self.field_spec(key) else {
                continue;
            };
            if spec.managed {
                continue;
            }
            match spec.check(value) {
                Ok(value) => {
                    out.insert(spec.name.to_string(), value);
                }
                Err(error) => errors.add(spec.name, error),
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }
}

fn violation(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

/// JSON number for `n`, kept integral when it has no fractional part.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn display_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
