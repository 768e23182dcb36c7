//! Block type schema model.
//!
//! # Responsibility
//! - Describe the structural payload schema a block type accepts.
//! - Name the reserved (projection-only) and disabled legacy type ids.
//!
//! # Invariants
//! - Field ids inside one schema are unique.
//! - Reserved and disabled ids can never back a native block.

use crate::model::section::SectionId;
use serde::{Deserialize, Serialize};

/// Type ids that only projected blocks may carry.
pub const RESERVED_PROJECTED_TYPES: &[&str] = &["todo", "todos", "habits", "morninghabits"];

/// Legacy built-ins that are still recognized but no longer writable.
pub const DISABLED_LEGACY_TYPES: &[&str] = &["checklist", "notes-legacy"];

/// Type id used for projected task blocks.
pub const PROJECTED_TODO_TYPE: &str = "todo";
/// Type id used for projected habit blocks.
pub const PROJECTED_HABIT_TYPE: &str = "habits";

/// Write availability of a type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAvailability {
    Writable,
    Reserved,
    Disabled,
}

/// Classifies a type id without touching storage.
pub fn type_availability(type_id: &str) -> TypeAvailability {
    let normalized = type_id.trim().to_ascii_lowercase();
    if RESERVED_PROJECTED_TYPES.contains(&normalized.as_str()) {
        TypeAvailability::Reserved
    } else if DISABLED_LEGACY_TYPES.contains(&normalized.as_str()) {
        TypeAvailability::Disabled
    } else {
        TypeAvailability::Writable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Enum,
}

/// One declared payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Numbers: minimum value. Strings and arrays: minimum length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Numbers: maximum value. Strings and arrays: maximum length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FieldSchema {
    pub fn new(id: &str, kind: FieldKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            required: false,
            min: None,
            max: None,
            options: Vec::new(),
            label: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|value| value.to_string()).collect();
        self
    }
}

/// Ordered payload schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default = "default_additional_properties")]
    pub additional_properties: bool,
}

fn default_additional_properties() -> bool {
    true
}

impl DataSchema {
    pub fn closed(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            additional_properties: false,
        }
    }

    pub fn open(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            additional_properties: true,
        }
    }

    pub fn field(&self, id: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeCategory {
    BuiltIn,
    Custom,
}

/// Registered block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockType {
    pub id: String,
    pub name: String,
    pub default_section: SectionId,
    #[serde(default)]
    pub subtitle_template: String,
    #[serde(default)]
    pub icon: String,
    pub data_schema: DataSchema,
    pub category: TypeCategory,
    /// Multi-instance types may appear several times per day and are
    /// excluded from by-type reconciliation.
    #[serde(default)]
    pub allow_multiple: bool,
}

impl BlockType {
    pub fn availability(&self) -> TypeAvailability {
        type_availability(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::{type_availability, DataSchema, FieldKind, FieldSchema, TypeAvailability};

    #[test]
    fn reserved_and_disabled_ids_are_classified() {
        assert_eq!(type_availability("todo"), TypeAvailability::Reserved);
        assert_eq!(type_availability("MorningHabits"), TypeAvailability::Reserved);
        assert_eq!(type_availability("checklist"), TypeAvailability::Disabled);
        assert_eq!(type_availability("sleep"), TypeAvailability::Writable);
    }

    #[test]
    fn schema_deserializes_with_open_default() {
        let schema: DataSchema = serde_json::from_value(serde_json::json!({
            "fields": [{"id": "hours", "type": "number", "min": 0, "max": 24}]
        }))
        .expect("schema should parse");
        assert!(schema.additional_properties);
        assert_eq!(
            schema.field("hours"),
            Some(&FieldSchema::new("hours", FieldKind::Number).range(Some(0.0), Some(24.0)))
        );
    }
}
