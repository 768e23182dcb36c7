//! Block payload validation and merging.
//!
//! # Responsibility
//! - Validate a `data` object against a [`DataSchema`] and normalize it.
//! - Deep-merge partial payload updates.
//! - Produce the empty default payload of a block type.
//!
//! # Invariants
//! - Validation reports every violated field, not only the first.
//! - Normalized payloads contain no `null` values for declared fields.

use crate::model::block_type::{DataSchema, FieldKind, FieldSchema};
use serde::Serialize;
use serde_json::{json, Map, Number, Value};

/// One field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Error details body for a list of violations.
pub fn violation_details(violations: &[FieldViolation]) -> Value {
    json!({ "fields": violations })
}

/// Validates `data` against `schema` and returns the normalized payload.
///
/// Rules:
/// - unknown fields are rejected when `additionalProperties` is false and
///   kept verbatim otherwise;
/// - required fields must be present and non-null;
/// - `null` optional fields are dropped;
/// - strings are trimmed before length checks.
pub fn validate_payload(
    schema: &DataSchema,
    data: &Map<String, Value>,
) -> Result<Map<String, Value>, Vec<FieldViolation>> {
    let mut violations = Vec::new();
    let mut normalized = Map::new();

    for (key, value) in data {
        if schema.field(key).is_some() {
            continue;
        }
        if !schema.additional_properties {
            violations.push(FieldViolation::new(key, "unknown field"));
        } else if !value.is_null() {
            normalized.insert(key.clone(), value.clone());
        }
    }

    for field in &schema.fields {
        match data.get(field.id.as_str()) {
            None | Some(Value::Null) => {
                if field.required {
                    violations.push(FieldViolation::new(&field.id, "is required"));
                }
            }
            Some(value) => match check_field(field, value) {
                Ok(value) => {
                    normalized.insert(field.id.clone(), value);
                }
                Err(message) => violations.push(FieldViolation::new(&field.id, message)),
            },
        }
    }

    if violations.is_empty() {
        Ok(normalized)
    } else {
        Err(violations)
    }
}

fn check_field(field: &FieldSchema, value: &Value) -> Result<Value, String> {
    match field.kind {
        FieldKind::String => {
            let text = value.as_str().ok_or("must be a string")?.trim();
            check_bounds(field, text.chars().count() as f64, "length")?;
            Ok(Value::String(text.to_string()))
        }
        FieldKind::Number => {
            let number = value
                .as_f64()
                .filter(|number| number.is_finite())
                .ok_or("must be a number")?;
            check_bounds(field, number, "value")?;
            Ok(value.clone())
        }
        FieldKind::Boolean => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| "must be a boolean".to_string()),
        FieldKind::Object => {
            if value.is_object() {
                Ok(value.clone())
            } else {
                Err("must be an object".to_string())
            }
        }
        FieldKind::Array => {
            let items = value.as_array().ok_or("must be an array")?;
            check_bounds(field, items.len() as f64, "item count")?;
            Ok(value.clone())
        }
        FieldKind::Enum => {
            let choice = value.as_str().ok_or("must be a string option")?.trim();
            if field.options.iter().any(|option| option == choice) {
                Ok(Value::String(choice.to_string()))
            } else {
                Err(format!("must be one of: {}", field.options.join(", ")))
            }
        }
    }
}

fn check_bounds(field: &FieldSchema, measured: f64, what: &str) -> Result<(), String> {
    if let Some(min) = field.min {
        if measured < min {
            return Err(format!("{what} must be >= {min}"));
        }
    }
    if let Some(max) = field.max {
        if measured > max {
            return Err(format!("{what} must be <= {max}"));
        }
    }
    Ok(())
}

/// Default payload for a freshly reconciled block of this schema.
pub fn empty_shape(schema: &DataSchema) -> Map<String, Value> {
    schema
        .fields
        .iter()
        .map(|field| {
            let value = match field.kind {
                FieldKind::String => Value::String(String::new()),
                FieldKind::Number => field
                    .min
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::from(0)),
                FieldKind::Boolean => Value::Bool(false),
                FieldKind::Object => Value::Object(Map::new()),
                FieldKind::Array => Value::Array(Vec::new()),
                FieldKind::Enum => field
                    .options
                    .first()
                    .map(|option| Value::String(option.clone()))
                    .unwrap_or(Value::Null),
            };
            (field.id.clone(), value)
        })
        .collect()
}

/// Merges `patch` into `base`; nested objects merge key by key, every other
/// value (arrays included) overwrites.
pub fn deep_merge(base: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, incoming) in patch {
        match (base.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => deep_merge(existing, nested),
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{deep_merge, empty_shape, validate_payload};
    use crate::model::block_type::{DataSchema, FieldKind, FieldSchema};
    use serde_json::{json, Value};

    fn sleep_schema() -> DataSchema {
        DataSchema::closed(vec![
            FieldSchema::new("hours", FieldKind::Number)
                .required()
                .range(Some(0.0), Some(24.0)),
            FieldSchema::new("quality", FieldKind::Enum).options(&["poor", "good"]),
            FieldSchema::new("note", FieldKind::String).range(None, Some(5.0)),
        ])
    }

    fn object(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn reports_all_violations() {
        let errors = validate_payload(
            &sleep_schema(),
            &object(json!({"quality": "great", "note": "too long", "extra": 1})),
        )
        .unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["extra", "hours", "quality", "note"]);
    }

    #[test]
    fn normalizes_strings_and_drops_null_optionals() {
        let normalized = validate_payload(
            &sleep_schema(),
            &object(json!({"hours": 7.5, "quality": " good ", "note": null})),
        )
        .unwrap();
        assert_eq!(Value::Object(normalized), json!({"hours": 7.5, "quality": "good"}));
    }

    #[test]
    fn open_schema_keeps_unknown_fields() {
        let schema = DataSchema::open(vec![]);
        let normalized = validate_payload(&schema, &object(json!({"free": [1, 2]}))).unwrap();
        assert_eq!(normalized["free"], json!([1, 2]));
    }

    #[test]
    fn empty_shape_uses_kind_defaults() {
        let shape = empty_shape(&sleep_schema());
        assert_eq!(
            Value::Object(shape),
            json!({"hours": 0.0, "quality": "poor", "note": ""})
        );
    }

    #[test]
    fn deep_merge_preserves_untouched_nested_fields() {
        let mut base = object(json!({"a": {"x": 1, "y": 2}, "list": [1]}));
        deep_merge(&mut base, &object(json!({"a": {"y": 3}, "list": [2, 3]})));
        assert_eq!(
            Value::Object(base),
            json!({"a": {"x": 1, "y": 3}, "list": [2, 3]})
        );
    }
}
