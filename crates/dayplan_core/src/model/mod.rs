//! Day plan domain model.
//!
//! # Responsibility
//! - Define the block, block type and primitive shapes shared by the
//!   repositories and services.
//! - Keep the external identifier contract (`proj_todo_*`, `proj_habit_*`)
//!   in one parsing function.
//!
//! # Invariants
//! - A day is partitioned into exactly three sections.
//! - Projected blocks are never persisted; they carry `isProjected = true`.

pub mod block;
pub mod block_ref;
pub mod block_type;
pub mod day;
pub mod primitive;
pub mod section;
