//! Day plan error taxonomy.
//!
//! # Responsibility
//! - Classify every failure into the categories callers map to responses:
//!   validation, not-found, conflict, unsupported, store.
//!
//! # Invariants
//! - Validation errors are raised before any write is attempted.
//! - Store errors keep the underlying message.

use crate::model::block_ref::BlockRefError;
use crate::model::day::DayParseError;
use crate::repo::document_store::StoreError;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DayPlanResult<T> = Result<T, DayPlanError>;

#[derive(Debug)]
pub enum DayPlanError {
    /// Malformed input, schema violation or disallowed field.
    Validation {
        message: String,
        details: Option<Value>,
    },
    /// Block or primitive absent, owned by someone else, or not on that day.
    NotFound(String),
    /// Id collision or ambiguous singleton reconciliation.
    Conflict(String),
    /// Disabled legacy block type.
    Unsupported(String),
    Store(StoreError),
}

impl DayPlanError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Stable machine-readable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_failed",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unsupported(_) => "unsupported",
            Self::Store(_) => "store_failed",
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

impl Display for DayPlanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { message, .. } => write!(f, "{message}"),
            Self::NotFound(message) => write!(f, "{message}"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::Unsupported(message) => write!(f, "{message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DayPlanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for DayPlanError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::AlreadyExists { collection, id } => {
                Self::Conflict(format!("`{id}` already exists in {collection}"))
            }
            other => Self::Store(other),
        }
    }
}

impl From<DayParseError> for DayPlanError {
    fn from(value: DayParseError) -> Self {
        Self::validation(value.to_string())
    }
}

impl From<BlockRefError> for DayPlanError {
    fn from(value: BlockRefError) -> Self {
        Self::validation(value.to_string())
    }
}
