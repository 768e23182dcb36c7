//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the owner-scoped JSON document store contract.
//! - Isolate SQLite details from the day plan services.
//! - Provide typed repositories for native blocks and primitives.
//!
//! # Invariants
//! - Every list read goes through [`resilient_query`], so a missing composite
//!   index degrades to a scan instead of an error.
//! - Repository APIs return semantic errors (`IndexMissing`, `AlreadyExists`)
//!   in addition to DB transport errors.

pub mod block_repo;
pub mod document_store;
pub mod primitive_repo;
pub mod resilient_query;
pub mod sqlite_store;
