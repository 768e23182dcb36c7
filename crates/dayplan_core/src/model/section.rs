//! Fixed day sections.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One of the three fixed partitions of a day.
///
/// Declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionId {
    Morning,
    Afternoon,
    Evening,
}

impl SectionId {
    pub const ALL: [SectionId; 3] = [Self::Morning, Self::Afternoon, Self::Evening];

    /// Sort rank used by the canonical block order.
    pub fn rank(self) -> u8 {
        match self {
            Self::Morning => 0,
            Self::Afternoon => 1,
            Self::Evening => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }

    /// Parses a wire value. Surrounding whitespace and case are ignored.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            _ => None,
        }
    }

    /// Parses a stored primitive value, falling back when absent or unknown.
    pub fn parse_or(value: Option<&str>, fallback: Self) -> Self {
        value.and_then(Self::parse).unwrap_or(fallback)
    }
}

impl Display for SectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
