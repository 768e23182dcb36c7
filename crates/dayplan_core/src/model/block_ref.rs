//! Block identifier classification.
//!
//! Projected blocks expose ids shaped `proj_todo_<taskId>` and
//! `proj_habit_<habitId>`. Every single-block operation parses the raw id once
//! into a [`BlockRef`] and dispatches on it.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub const PROJECTED_TODO_PREFIX: &str = "proj_todo_";
pub const PROJECTED_HABIT_PREFIX: &str = "proj_habit_";

/// Which primitive backs a projected block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectedKind {
    Todo,
    Habit,
}

impl ProjectedKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Todo => PROJECTED_TODO_PREFIX,
            Self::Habit => PROJECTED_HABIT_PREFIX,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Habit => "habit",
        }
    }
}

/// Typed reference to the store that backs a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockRef {
    Native(String),
    Projected {
        kind: ProjectedKind,
        primitive_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRefError {
    Empty,
    MissingPrimitiveId(String),
}

impl Display for BlockRefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "block id cannot be empty"),
            Self::MissingPrimitiveId(raw) => {
                write!(f, "projected block id `{raw}` is missing its primitive id")
            }
        }
    }
}

impl Error for BlockRefError {}

impl BlockRef {
    /// Classifies a raw block id.
    pub fn parse(raw: &str) -> Result<Self, BlockRefError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BlockRefError::Empty);
        }

        for kind in [ProjectedKind::Todo, ProjectedKind::Habit] {
            if let Some(rest) = trimmed.strip_prefix(kind.prefix()) {
                if rest.is_empty() {
                    return Err(BlockRefError::MissingPrimitiveId(trimmed.to_string()));
                }
                return Ok(Self::Projected {
                    kind,
                    primitive_id: rest.to_string(),
                });
            }
        }

        Ok(Self::Native(trimmed.to_string()))
    }

    pub fn projected(kind: ProjectedKind, primitive_id: &str) -> Self {
        Self::Projected {
            kind,
            primitive_id: primitive_id.to_string(),
        }
    }

    /// External id string for this reference.
    pub fn external_id(&self) -> String {
        match self {
            Self::Native(id) => id.clone(),
            Self::Projected { kind, primitive_id } => format!("{}{primitive_id}", kind.prefix()),
        }
    }
}

/// Returns whether a raw id uses a reserved projected prefix.
pub fn has_projected_shape(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with(PROJECTED_TODO_PREFIX) || trimmed.starts_with(PROJECTED_HABIT_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::{has_projected_shape, BlockRef, BlockRefError, ProjectedKind};

    #[test]
    fn parses_projected_and_native_ids() {
        assert_eq!(
            BlockRef::parse("proj_todo_t1").unwrap(),
            BlockRef::projected(ProjectedKind::Todo, "t1")
        );
        assert_eq!(
            BlockRef::parse("proj_habit_h_9").unwrap(),
            BlockRef::projected(ProjectedKind::Habit, "h_9")
        );
        assert_eq!(
            BlockRef::parse("proj_other_1").unwrap(),
            BlockRef::Native("proj_other_1".to_string())
        );
    }

    #[test]
    fn rejects_empty_and_prefix_only_ids() {
        assert_eq!(BlockRef::parse("  "), Err(BlockRefError::Empty));
        assert!(matches!(
            BlockRef::parse("proj_habit_"),
            Err(BlockRefError::MissingPrimitiveId(_))
        ));
    }

    #[test]
    fn external_id_restores_wire_shape() {
        let reference = BlockRef::parse("proj_todo_abc").unwrap();
        assert_eq!(reference.external_id(), "proj_todo_abc");
        assert!(has_projected_shape("proj_habit_x"));
        assert!(!has_projected_shape("native-1"));
    }
}
