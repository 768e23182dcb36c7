//! Day plan use-case services.
//!
//! # Responsibility
//! - Orchestrate repositories into the day plan operations: block type
//!   resolution, projection, native block CRUD and reconciliation.
//! - Keep the HTTP layer decoupled from storage details.
//!
//! # Invariants
//! - Services never bypass registry validation before a native write.
//! - The current time reaches services only through `RequestContext`.

pub mod block_types;
pub mod collaborators;
pub mod day_plan;
pub mod display;
pub mod native_blocks;
pub mod payload;
pub mod projection;
pub mod requests;
