//! Day block model and canonical ordering.
//!
//! # Responsibility
//! - Define the single block shape shared by native and projected blocks.
//! - Provide the total order used by every merged day listing.
//!
//! # Invariants
//! - Canonical order: section rank, `order`, `createdAt`, `id`.
//! - `DayBlock::Projected` serializes with `isProjected: true`; native blocks
//!   omit the flag.

use crate::model::day::DayDate;
use crate::model::section::SectionId;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Origin of a native block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BlockSource {
    Template,
    #[default]
    User,
    AutoSync,
    #[serde(rename = "agent-origin")]
    Agent,
}

/// Block document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub user_id: String,
    pub date: DayDate,
    pub type_id: String,
    pub section_id: SectionId,
    pub order: i64,
    #[serde(default)]
    pub is_expanded: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub pillar_id: Option<String>,
    #[serde(default)]
    pub source: BlockSource,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Block {
    /// Total order used for day listings.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.section_id
            .rank()
            .cmp(&other.section_id.rank())
            .then(self.order.cmp(&other.order))
            .then(self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A block as seen in a day: stored natively or derived from a primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum DayBlock {
    Native(Block),
    Projected(Block),
}

impl DayBlock {
    pub fn block(&self) -> &Block {
        match self {
            Self::Native(block) | Self::Projected(block) => block,
        }
    }

    pub fn into_block(self) -> Block {
        match self {
            Self::Native(block) | Self::Projected(block) => block,
        }
    }

    pub fn is_projected(&self) -> bool {
        matches!(self, Self::Projected(_))
    }

    pub fn id(&self) -> &str {
        self.block().id.as_str()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockView<'a> {
    #[serde(flatten)]
    block: &'a Block,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_projected: bool,
}

impl Serialize for DayBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BlockView {
            block: self.block(),
            is_projected: self.is_projected(),
        }
        .serialize(serializer)
    }
}

/// Sorts blocks into canonical day order.
pub fn sort_canonical(blocks: &mut [DayBlock]) {
    blocks.sort_by(|left, right| left.block().canonical_cmp(right.block()));
}

#[cfg(test)]
mod tests {
    use super::{sort_canonical, Block, BlockSource, DayBlock};
    use crate::model::day::DayDate;
    use crate::model::section::SectionId;
    use serde_json::Map;

    fn block(id: &str, section: SectionId, order: i64, created_at: i64) -> Block {
        Block {
            id: id.to_string(),
            user_id: "u1".to_string(),
            date: DayDate::parse("2026-01-05").unwrap(),
            type_id: "note".to_string(),
            section_id: section,
            order,
            is_expanded: false,
            title: String::new(),
            subtitle: String::new(),
            icon: String::new(),
            pillar_id: None,
            source: BlockSource::User,
            data: Map::new(),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn canonical_sort_uses_section_order_created_and_id() {
        let mut blocks = vec![
            DayBlock::Native(block("z", SectionId::Evening, 0, 1)),
            DayBlock::Projected(block("proj_todo_b", SectionId::Morning, 2, 0)),
            DayBlock::Projected(block("proj_todo_a", SectionId::Morning, 2, 0)),
            DayBlock::Native(block("m", SectionId::Morning, 2, 5)),
            DayBlock::Native(block("k", SectionId::Morning, 1, 9)),
        ];
        sort_canonical(&mut blocks);
        let ids: Vec<&str> = blocks.iter().map(DayBlock::id).collect();
        assert_eq!(ids, vec!["k", "proj_todo_a", "proj_todo_b", "m", "z"]);
    }

    #[test]
    fn sources_use_kebab_case_wire_names() {
        assert_eq!(serde_json::to_value(BlockSource::AutoSync).unwrap(), "auto-sync");
        assert_eq!(serde_json::to_value(BlockSource::Agent).unwrap(), "agent-origin");
        let parsed: BlockSource = serde_json::from_value("agent-origin".into()).unwrap();
        assert_eq!(parsed, BlockSource::Agent);
    }

    #[test]
    fn projected_flag_is_only_serialized_for_projected_blocks() {
        let native = serde_json::to_value(DayBlock::Native(block("n", SectionId::Morning, 0, 1)))
            .unwrap();
        assert!(native.get("isProjected").is_none());
        assert_eq!(native["sectionId"], "morning");

        let projected =
            serde_json::to_value(DayBlock::Projected(block("p", SectionId::Morning, 0, 0)))
                .unwrap();
        assert_eq!(projected["isProjected"], true);
        assert_eq!(projected["date"], "2026-01-05");
    }
}
