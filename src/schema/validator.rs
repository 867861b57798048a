//! Schema validation and casting
//!
//! A validator takes a raw object, casts every declared field to its schema
//! type and reports problems as a list of [`FieldError`]s. It never fails
//! fast: the returned object holds every value that could be cast.
//!
//! Rules applied by [`SimpleValidator`]:
//! - Undeclared fields are rejected
//! - Absent fields get their `default`, or are reported when required
//! - `null` is kept only when the caller allows it
//! - Loose input (numeric strings, `"yes"`, integer ids) is cast to the
//!   declared type

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use super::errors::FieldError;
use super::types::{FieldDef, FieldType, Schema};
use crate::driver::Record;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("id pattern is valid"));

/// Knobs for one validation run
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Only validate the fields present in the object (partial validation)
    pub only_object_values: bool,
    /// Fields copied through without any check
    pub skip_fields: Vec<String>,
    /// Treat `""` as `null`
    pub empty_as_null: bool,
    /// Keep `null` values instead of dropping or rejecting them
    pub can_be_null: bool,
    /// Existing record; its fields satisfy `required`
    pub record: Option<Record>,
}

impl ValidateOptions {
    pub fn partial() -> Self {
        Self {
            only_object_values: true,
            ..Default::default()
        }
    }

    pub fn skip_field(mut self, field: impl Into<String>) -> Self {
        self.skip_fields.push(field.into());
        self
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.record = Some(record);
        self
    }
}

/// Outcome of a validation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated {
    /// Cast object
    pub object: Record,
    /// Every problem found
    pub errors: Vec<FieldError>,
}

impl Validated {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validation contract used by the pipeline
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(&self, schema: &Schema, object: Record, options: &ValidateOptions) -> Validated;
}

/// Default validator: casts JSON values to the declared field types
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleValidator;

impl SimpleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous validation
    pub fn validate_object(&self, schema: &Schema, object: Record, options: &ValidateOptions) -> Validated {
        let mut result = Validated::default();

        for (name, value) in object {
            if options.skip_fields.contains(&name) {
                result.object.insert(name, value);
                continue;
            }

            let Some(def) = schema.get(&name) else {
                result.errors.push(FieldError::not_allowed(name));
                continue;
            };

            let is_null = value.is_null() || (options.empty_as_null && value.as_str() == Some(""));
            if is_null {
                if options.can_be_null {
                    result.object.insert(name, Value::Null);
                } else if def.required {
                    result.errors.push(FieldError::required(name));
                }
                continue;
            }

            match cast_value(def, value) {
                Ok(cast) => {
                    result.object.insert(name, cast);
                }
                Err(message) => result.errors.push(FieldError::new(name, message)),
            }
        }

        if !options.only_object_values {
            for (name, def) in schema.fields() {
                if result.object.contains_key(name)
                    || options.skip_fields.contains(name)
                    || result.errors.iter().any(|e| &e.field == name)
                {
                    continue;
                }

                if let Some(default) = &def.default {
                    result.object.insert(name.clone(), default.clone());
                } else if def.required {
                    let in_record = options
                        .record
                        .as_ref()
                        .and_then(|r| r.get(name))
                        .is_some_and(|v| !v.is_null());
                    if !in_record {
                        result.errors.push(FieldError::required(name.clone()));
                    }
                }
            }
        }

        result
    }
}

#[async_trait]
impl SchemaValidator for SimpleValidator {
    async fn validate(&self, schema: &Schema, object: Record, options: &ValidateOptions) -> Validated {
        self.validate_object(schema, object, options)
    }
}

/// Cast one non-null value to its declared type
fn cast_value(def: &FieldDef, value: Value) -> Result<Value, String> {
    let mismatch = || FieldError::type_mismatch("", def.field_type.type_name()).message;

    match def.field_type {
        FieldType::String => {
            let s = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(mismatch()),
            };
            let len = s.chars().count() as f64;
            if def.min.is_some_and(|min| len < min) {
                return Err("Field is too short".to_string());
            }
            if def.max.is_some_and(|max| len > max) {
                return Err("Field is too long".to_string());
            }
            Ok(Value::String(s))
        }
        FieldType::Number => {
            let n = match value {
                Value::Number(n) => n,
                Value::String(s) => parse_number(s.trim()).ok_or_else(mismatch)?,
                _ => return Err(mismatch()),
            };
            let v = n.as_f64().ok_or_else(mismatch)?;
            if def.min.is_some_and(|min| v < min) {
                return Err("Field is too low".to_string());
            }
            if def.max.is_some_and(|max| v > max) {
                return Err("Field is too high".to_string());
            }
            Ok(Value::Number(n))
        }
        FieldType::Id => match value {
            Value::String(s) if ID_PATTERN.is_match(&s) => Ok(Value::String(s)),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            _ => Err(mismatch()),
        },
        FieldType::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            Value::Number(n) => match n.as_f64() {
                Some(v) if v == 1.0 => Ok(Value::Bool(true)),
                Some(v) if v == 0.0 => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        FieldType::Date => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(Value::String(dt.to_rfc3339()));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| mismatch())
        }
        FieldType::Array => match value {
            Value::Array(_) => Ok(value),
            _ => Err(mismatch()),
        },
        FieldType::Object => match value {
            Value::Object(_) => Ok(value),
            _ => Err(mismatch()),
        },
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn people() -> Schema {
        Schema::new()
            .field("id", FieldDef::id())
            .field("name", FieldDef::string())
            .field("surname", FieldDef::string().required().max(20.0))
            .field("age", FieldDef::number().max(99.0))
            .field("active", FieldDef::boolean())
            .field("born", FieldDef::date())
            .field("tags", FieldDef::array())
    }

    fn validate(object: Value, options: &ValidateOptions) -> Validated {
        SimpleValidator.validate_object(&people(), record(object), options)
    }

    #[test]
    fn test_valid_object_passes() {
        let v = validate(
            json!({"name": "Tony", "surname": "Mobily", "age": 37}),
            &ValidateOptions::default(),
        );
        assert!(v.is_valid(), "{:?}", v.errors);
        assert_eq!(v.object["age"], json!(37));
    }

    #[test]
    fn test_missing_required_field() {
        let v = validate(json!({"name": "Tony"}), &ValidateOptions::default());
        assert_eq!(v.errors, vec![FieldError::required("surname")]);
    }

    #[test]
    fn test_required_satisfied_by_record() {
        let options = ValidateOptions::default().with_record(record(json!({"surname": "Mobily"})));
        let v = validate(json!({"name": "Tony"}), &options);
        assert!(v.is_valid());
        assert!(!v.object.contains_key("surname"));
    }

    #[test]
    fn test_partial_validation_skips_absent_fields() {
        let v = validate(json!({"age": "12"}), &ValidateOptions::partial());
        assert!(v.is_valid());
        assert_eq!(v.object["age"], json!(12));
    }

    #[test]
    fn test_unknown_field_not_allowed() {
        let v = validate(json!({"surname": "M", "nickname": "T"}), &ValidateOptions::default());
        assert_eq!(v.errors, vec![FieldError::not_allowed("nickname")]);
    }

    #[test]
    fn test_skip_fields_pass_through() {
        let options = ValidateOptions::default().skip_field("nickname");
        let v = validate(json!({"surname": "M", "nickname": 4}), &options);
        assert!(v.is_valid());
        assert_eq!(v.object["nickname"], json!(4));
    }

    #[test]
    fn test_bounds() {
        let v = validate(
            json!({"surname": "A name that is much too long", "age": 120}),
            &ValidateOptions::default(),
        );
        assert_eq!(v.errors.len(), 2);
        assert!(v.errors.contains(&FieldError::new("surname", "Field is too long")));
        assert!(v.errors.contains(&FieldError::new("age", "Field is too high")));
    }

    #[test]
    fn test_casting() {
        let v = validate(
            json!({
                "id": 42,
                "surname": 7,
                "active": "yes",
                "born": "1980-01-02",
                "tags": ["a"]
            }),
            &ValidateOptions::default(),
        );
        assert!(v.is_valid(), "{:?}", v.errors);
        assert_eq!(v.object["id"], json!("42"));
        assert_eq!(v.object["surname"], json!("7"));
        assert_eq!(v.object["active"], json!(true));
        assert_eq!(v.object["born"], json!("1980-01-02"));
    }

    #[test]
    fn test_type_mismatches() {
        let v = validate(
            json!({"surname": "M", "id": "not valid!", "age": "old", "tags": "a", "born": "yesterday"}),
            &ValidateOptions::default(),
        );
        assert_eq!(v.errors.len(), 4);
        assert!(v.errors.contains(&FieldError::type_mismatch("id", "id")));
        assert!(v.errors.contains(&FieldError::type_mismatch("age", "number")));
        assert!(v.errors.contains(&FieldError::type_mismatch("tags", "array")));
        assert!(v.errors.contains(&FieldError::type_mismatch("born", "date")));
    }

    #[test]
    fn test_null_handling() {
        let v = validate(json!({"surname": null, "name": null}), &ValidateOptions::default());
        assert_eq!(v.errors, vec![FieldError::required("surname")]);
        assert!(!v.object.contains_key("name"));

        let options = ValidateOptions {
            can_be_null: true,
            ..ValidateOptions::partial()
        };
        let v = validate(json!({"name": null}), &options);
        assert!(v.is_valid());
        assert_eq!(v.object["name"], Value::Null);

        let options = ValidateOptions {
            empty_as_null: true,
            ..ValidateOptions::partial()
        };
        let v = validate(json!({"name": ""}), &options);
        assert!(v.is_valid());
        assert!(!v.object.contains_key("name"));
    }

    #[test]
    fn test_default_applied() {
        let schema = people().field("role", FieldDef::string().default_value(json!("member")));
        let v = SimpleValidator.validate_object(
            &schema,
            record(json!({"surname": "M"})),
            &ValidateOptions::default(),
        );
        assert!(v.is_valid());
        assert_eq!(v.object["role"], json!("member"));
    }
}
