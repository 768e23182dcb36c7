//! Request bodies and call context for day plan operations.
//!
//! Bodies are decoded strictly: unknown top-level fields are validation
//! errors, so a typo never silently turns into a no-op.

use crate::error::{DayPlanError, DayPlanResult};
use crate::model::block::BlockSource;
use crate::model::section::SectionId;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Caller identity and clock for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: String,
    pub now_ms: i64,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            user_id: user_id.into(),
            now_ms,
        }
    }

    /// Context stamped with the current wall clock.
    pub fn at_now(user_id: impl Into<String>) -> Self {
        Self::new(user_id, chrono::Utc::now().timestamp_millis())
    }
}

/// Body of a native block create.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBlock {
    #[serde(default)]
    pub id: Option<String>,
    pub type_id: String,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_expanded: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub source: Option<BlockSource>,
    #[serde(default)]
    pub pillar_id: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl NewBlock {
    pub fn of_type(type_id: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            ..Self::default()
        }
    }

    pub fn from_json(value: Value) -> DayPlanResult<Self> {
        decode_body(value, "block")
    }
}

/// Partial update of a block. `pillar_id: Some(None)` clears the pillar.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockPatch {
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_expanded: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub pillar_id: Option<Option<String>>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl BlockPatch {
    pub fn from_json(value: Value) -> DayPlanResult<Self> {
        decode_body(value, "patch")
    }

    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Body of a move: target section and order, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveRequest {
    pub section_id: String,
    pub order: i64,
}

impl MoveRequest {
    pub fn from_json(value: Value) -> DayPlanResult<Self> {
        decode_body(value, "move")
    }
}

/// Optional narrowing of a day listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockFilter {
    pub section_id: Option<SectionId>,
    pub type_id: Option<String>,
}

impl BlockFilter {
    /// Builds a filter from raw query parameters; blank values mean "any".
    pub fn from_params(section_id: Option<&str>, type_id: Option<&str>) -> DayPlanResult<Self> {
        let section_id = match section_id.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) => Some(SectionId::parse(raw).ok_or_else(|| {
                DayPlanError::validation(format!("unknown sectionId `{raw}`"))
            })?),
            None => None,
        };
        let type_id = type_id
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self {
            section_id,
            type_id,
        })
    }
}

fn decode_body<T: for<'de> Deserialize<'de>>(value: Value, what: &str) -> DayPlanResult<T> {
    if !value.is_object() {
        return Err(DayPlanError::validation(format!(
            "{what} body must be a JSON object"
        )));
    }
    serde_json::from_value(value)
        .map_err(|err| DayPlanError::validation(format!("invalid {what} body: {err}")))
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::{BlockFilter, BlockPatch, MoveRequest, NewBlock};
    use crate::model::section::SectionId;
    use serde_json::json;

    #[test]
    fn patch_distinguishes_null_pillar_from_absent() {
        let cleared = BlockPatch::from_json(json!({"pillarId": null})).unwrap();
        assert_eq!(cleared.pillar_id, Some(None));

        let untouched = BlockPatch::from_json(json!({"order": 2})).unwrap();
        assert_eq!(untouched.pillar_id, None);
        assert_eq!(untouched.order, Some(2));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(BlockPatch::from_json(json!({"typeId": "mood"})).is_err());
        assert!(MoveRequest::from_json(json!({"sectionId": "evening", "order": 1, "data": {}}))
            .is_err());
        assert!(NewBlock::from_json(json!({"typeId": "mood", "date": "2026-01-05"})).is_err());
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        let err = NewBlock::from_json(json!(["mood"])).unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }

    #[test]
    fn filter_params_treat_blank_as_any() {
        let filter = BlockFilter::from_params(Some(" "), Some("")).unwrap();
        assert_eq!(filter, BlockFilter::default());

        let filter = BlockFilter::from_params(Some("Evening"), Some("mood")).unwrap();
        assert_eq!(filter.section_id, Some(SectionId::Evening));
        assert_eq!(filter.type_id.as_deref(), Some("mood"));

        assert!(BlockFilter::from_params(Some("night"), None).is_err());
    }
}
