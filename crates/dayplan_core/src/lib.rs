//! Day plan domain core.
//! Block reconciliation, projection and storage invariants live here; outer
//! crates only translate transport.

pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::{DayPlanError, DayPlanResult};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use model::block::{Block, BlockSource, DayBlock};
pub use model::block_ref::{BlockRef, ProjectedKind};
pub use model::block_type::{BlockType, DataSchema, FieldKind, FieldSchema, TypeCategory};
pub use model::day::DayDate;
pub use model::primitive::{Habit, HabitLog, HabitSchedule, Task, TaskStatus};
pub use model::section::SectionId;
pub use repo::document_store::{DocumentStore, StoreError, StoreResult};
pub use repo::sqlite_store::SqliteDocumentStore;
pub use service::block_types::{BlockTypeDraft, BlockTypeRegistry};
pub use service::collaborators::{
    DayPlanEvent, DayPlanEventKind, EventSink, LogEventSink, PillarValidator, StorePillarValidator,
};
pub use service::day_plan::{ByTypeOutcome, DayPlanService, DeleteEffect, DeletedBlock};
pub use service::display::{BlockDisplay, ResolvedBlock};
pub use service::requests::{BlockFilter, BlockPatch, MoveRequest, NewBlock, RequestContext};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
