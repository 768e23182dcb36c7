//! Block type registry.
//!
//! # Responsibility
//! - Resolve type ids to schemas, mixing built-in and user-defined types.
//! - Lazily ensure the built-in set exists for each user.
//! - Validate block payloads and user-defined type drafts.
//!
//! # Invariants
//! - Ensuring built-ins is idempotent; existing documents are never
//!   overwritten.
//! - Custom types never shadow a built-in, reserved or disabled id.

use crate::error::{DayPlanError, DayPlanResult};
use crate::model::block_type::{
    type_availability, BlockType, DataSchema, FieldKind, FieldSchema, TypeAvailability,
    TypeCategory, PROJECTED_HABIT_TYPE, PROJECTED_TODO_TYPE,
};
use crate::model::section::SectionId;
use crate::repo::document_store::{
    collections, DocumentStore, StoreError, StoreResult, StoredDocument,
};
use crate::service::payload::{validate_payload, violation_details};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

static TYPE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").expect("valid type id regex"));
static FIELD_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,63}$").expect("valid field id regex"));

/// Built-in block types shipped with every account.
pub fn builtin_types() -> Vec<BlockType> {
    vec![
        builtin(
            "sleep",
            "Sleep",
            SectionId::Morning,
            "{hours}h · {quality}",
            "moon",
            false,
            DataSchema::closed(vec![
                FieldSchema::new("bedtime", FieldKind::String),
                FieldSchema::new("wakeTime", FieldKind::String),
                FieldSchema::new("hours", FieldKind::Number).range(Some(0.0), Some(24.0)),
                FieldSchema::new("quality", FieldKind::Enum)
                    .options(&["poor", "fair", "good", "great"]),
            ]),
        ),
        builtin(
            "mood",
            "Mood",
            SectionId::Morning,
            "{rating}/10",
            "smile",
            false,
            DataSchema::closed(vec![
                FieldSchema::new("rating", FieldKind::Number)
                    .required()
                    .range(Some(1.0), Some(10.0)),
                FieldSchema::new("note", FieldKind::String).range(None, Some(500.0)),
            ]),
        ),
        builtin(
            "focus",
            "Focus",
            SectionId::Morning,
            "{goal}",
            "target",
            true,
            DataSchema::closed(vec![
                FieldSchema::new("goal", FieldKind::String)
                    .required()
                    .range(None, Some(280.0)),
                FieldSchema::new("minutes", FieldKind::Number).range(Some(0.0), Some(1440.0)),
            ]),
        ),
        builtin(
            "meal",
            "Meal",
            SectionId::Afternoon,
            "{mealType}",
            "utensils",
            true,
            DataSchema::closed(vec![
                FieldSchema::new("mealType", FieldKind::Enum)
                    .options(&["breakfast", "lunch", "dinner", "snack"]),
                FieldSchema::new("description", FieldKind::String),
                FieldSchema::new("calories", FieldKind::Number).range(Some(0.0), None),
            ]),
        ),
        builtin(
            "workout",
            "Workout",
            SectionId::Afternoon,
            "{activity} · {durationMinutes} min",
            "dumbbell",
            true,
            DataSchema::closed(vec![
                FieldSchema::new("activity", FieldKind::String).required(),
                FieldSchema::new("durationMinutes", FieldKind::Number)
                    .range(Some(0.0), Some(1440.0)),
                FieldSchema::new("intensity", FieldKind::Enum)
                    .options(&["low", "moderate", "high"]),
            ]),
        ),
        builtin(
            "note",
            "Note",
            SectionId::Afternoon,
            "",
            "file-text",
            true,
            DataSchema::open(vec![FieldSchema::new("text", FieldKind::String)]),
        ),
        builtin(
            "journal",
            "Journal",
            SectionId::Evening,
            "",
            "book-open",
            false,
            DataSchema::closed(vec![
                FieldSchema::new("entry", FieldKind::String),
                FieldSchema::new("tags", FieldKind::Array),
            ]),
        ),
        builtin(
            "reflection",
            "Evening Reflection",
            SectionId::Evening,
            "{tomorrowFocus}",
            "sunset",
            false,
            DataSchema::closed(vec![
                FieldSchema::new("wins", FieldKind::Array),
                FieldSchema::new("lessons", FieldKind::Array),
                FieldSchema::new("tomorrowFocus", FieldKind::String),
            ]),
        ),
        builtin(
            PROJECTED_TODO_TYPE,
            "To-do",
            SectionId::Afternoon,
            "{status}",
            "check-square",
            true,
            DataSchema::open(vec![
                FieldSchema::new("title", FieldKind::String),
                FieldSchema::new("description", FieldKind::String),
                FieldSchema::new("status", FieldKind::Enum).options(&["active", "completed"]),
            ]),
        ),
        builtin(
            PROJECTED_HABIT_TYPE,
            "Habit",
            SectionId::Morning,
            "{status}",
            "repeat",
            true,
            DataSchema::open(vec![
                FieldSchema::new("name", FieldKind::String),
                FieldSchema::new("completed", FieldKind::Boolean),
                FieldSchema::new("value", FieldKind::Number),
                FieldSchema::new("notes", FieldKind::String),
            ]),
        ),
    ]
}

fn builtin(
    id: &str,
    name: &str,
    default_section: SectionId,
    subtitle_template: &str,
    icon: &str,
    allow_multiple: bool,
    data_schema: DataSchema,
) -> BlockType {
    BlockType {
        id: id.to_string(),
        name: name.to_string(),
        default_section,
        subtitle_template: subtitle_template.to_string(),
        icon: icon.to_string(),
        data_schema,
        category: TypeCategory::BuiltIn,
        allow_multiple,
    }
}

fn is_builtin_id(type_id: &str) -> bool {
    builtin_types().iter().any(|block_type| block_type.id == type_id)
}

/// User-supplied definition of a custom block type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockTypeDraft {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_section: Option<SectionId>,
    #[serde(default)]
    pub subtitle_template: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "empty_open_schema")]
    pub data_schema: DataSchema,
    #[serde(default)]
    pub allow_multiple: bool,
}

fn empty_open_schema() -> DataSchema {
    DataSchema::open(Vec::new())
}

impl BlockTypeDraft {
    pub fn from_json(value: Value) -> DayPlanResult<Self> {
        serde_json::from_value(value)
            .map_err(|err| DayPlanError::validation(format!("invalid block type body: {err}")))
    }
}

/// Registry over `block_types` documents, keyed `<userId>:<typeId>`.
pub struct BlockTypeRegistry<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DocumentStore + ?Sized> BlockTypeRegistry<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Resolves a type id for `user_id`, seeding built-ins on first miss.
    pub fn resolve(&self, user_id: &str, type_id: &str) -> StoreResult<Option<BlockType>> {
        let type_id = type_id.trim();
        if let Some(found) = self.load(user_id, type_id)? {
            return Ok(Some(found));
        }
        if !is_builtin_id(type_id) {
            return Ok(None);
        }
        self.ensure_builtins(user_id)?;
        self.load(user_id, type_id)
    }

    /// Creates any missing built-in type documents. Returns how many were
    /// created.
    pub fn ensure_builtins(&self, user_id: &str) -> StoreResult<usize> {
        let mut created = 0;
        for block_type in builtin_types() {
            let document =
                StoredDocument::from_record(&doc_id(user_id, &block_type.id), user_id, &block_type)?;
            match self.store.create(collections::BLOCK_TYPES, &document) {
                Ok(()) => created += 1,
                Err(StoreError::AlreadyExists { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        if created > 0 {
            info!("event=builtin_types_ensured module=service status=ok created={created}");
        }
        Ok(created)
    }

    /// All types visible to `user_id`: built-ins first, then custom, by id.
    pub fn list(&self, user_id: &str) -> StoreResult<Vec<BlockType>> {
        self.ensure_builtins(user_id)?;
        let mut types = self
            .store
            .scan_owned(collections::BLOCK_TYPES, user_id)?
            .iter()
            .map(StoredDocument::decode)
            .collect::<StoreResult<Vec<BlockType>>>()?;
        types.retain(|block_type| block_type.availability() != TypeAvailability::Disabled);
        types.sort_by(|left, right| {
            (left.category != TypeCategory::BuiltIn, &left.id)
                .cmp(&(right.category != TypeCategory::BuiltIn, &right.id))
        });
        Ok(types)
    }

    /// Registers a user-defined block type.
    pub fn create_custom(&self, user_id: &str, draft: BlockTypeDraft) -> DayPlanResult<BlockType> {
        let type_id = draft.id.trim().to_string();
        if !TYPE_ID_RE.is_match(&type_id) {
            return Err(DayPlanError::validation(format!(
                "block type id `{type_id}` must match [a-z0-9][a-z0-9_-]*"
            )));
        }
        match type_availability(&type_id) {
            TypeAvailability::Writable => {}
            TypeAvailability::Reserved | TypeAvailability::Disabled => {
                return Err(DayPlanError::validation(format!(
                    "block type id `{type_id}` is reserved"
                )));
            }
        }
        if is_builtin_id(&type_id) {
            return Err(DayPlanError::conflict(format!(
                "block type `{type_id}` is built in"
            )));
        }
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(DayPlanError::validation("block type name cannot be empty"));
        }
        validate_schema_definition(&draft.data_schema)?;

        let block_type = BlockType {
            id: type_id.clone(),
            name,
            default_section: draft.default_section.unwrap_or(SectionId::Morning),
            subtitle_template: draft.subtitle_template,
            icon: draft.icon,
            data_schema: draft.data_schema,
            category: TypeCategory::Custom,
            allow_multiple: draft.allow_multiple,
        };
        let document =
            StoredDocument::from_record(&doc_id(user_id, &type_id), user_id, &block_type)?;
        self.store.create(collections::BLOCK_TYPES, &document)?;
        info!("event=block_type_create module=service status=ok type_id={type_id}");
        Ok(block_type)
    }

    /// Validates a block payload against a type schema.
    pub fn validate_data(
        &self,
        block_type: &BlockType,
        data: &Map<String, Value>,
    ) -> DayPlanResult<Map<String, Value>> {
        validate_payload(&block_type.data_schema, data).map_err(|violations| {
            DayPlanError::validation_with(
                format!("data does not match block type `{}`", block_type.id),
                violation_details(&violations),
            )
        })
    }

    fn load(&self, user_id: &str, type_id: &str) -> StoreResult<Option<BlockType>> {
        match self
            .store
            .get(collections::BLOCK_TYPES, &doc_id(user_id, type_id))?
        {
            Some(document) if document.user_id == user_id => Ok(Some(document.decode()?)),
            _ => Ok(None),
        }
    }
}

fn doc_id(user_id: &str, type_id: &str) -> String {
    format!("{user_id}:{type_id}")
}

fn validate_schema_definition(schema: &DataSchema) -> DayPlanResult<()> {
    let mut seen = BTreeSet::new();
    let mut problems = Vec::new();
    for field in &schema.fields {
        if !FIELD_ID_RE.is_match(&field.id) {
            problems.push(json!({"field": field.id, "message": "invalid field id"}));
        }
        if !seen.insert(field.id.as_str()) {
            problems.push(json!({"field": field.id, "message": "duplicate field id"}));
        }
        if field.kind == FieldKind::Enum && field.options.is_empty() {
            problems.push(json!({"field": field.id, "message": "enum requires options"}));
        }
        if let (Some(min), Some(max)) = (field.min, field.max) {
            if min > max {
                problems.push(json!({"field": field.id, "message": "min exceeds max"}));
            }
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(DayPlanError::validation_with(
            "invalid data schema",
            json!({ "fields": problems }),
        ))
    }
}
