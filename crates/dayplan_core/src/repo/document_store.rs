//! Owner-scoped JSON document store contract.
//!
//! # Responsibility
//! - Describe documents, filtered queries and atomic write batches.
//! - Evaluate the same filters and ordering in memory for scan fallbacks.
//!
//! # Invariants
//! - Filtered or ordered queries may fail with `IndexMissing`; unfiltered
//!   owner scans never do.
//! - In-memory evaluation matches SQLite comparison semantics: nulls never
//!   satisfy range filters and type classes order null < number < text.

use crate::db::DbError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Collection names used by the day plan core.
pub mod collections {
    pub const DAY_BLOCKS: &str = "day_blocks";
    pub const BLOCK_TYPES: &str = "block_types";
    pub const TASKS: &str = "tasks";
    pub const HABITS: &str = "habits";
    pub const HABIT_LOGS: &str = "habit_logs";
    pub const PILLARS: &str = "pillars";
}

/// Owner field every document carries.
pub const OWNER_FIELD: &str = "userId";

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field name regex"));

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// The query needs a composite index that is not declared.
    IndexMissing { collection: String, fields: String },
    /// A create targeted an id that already exists.
    AlreadyExists { collection: String, id: String },
    /// Connection schema is not migrated to the expected version.
    Uninitialized {
        expected_version: u32,
        actual_version: u32,
    },
    /// Query or persisted data cannot be interpreted.
    InvalidData(String),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexMissing { collection, fields } => write!(
                f,
                "query on `{collection}` requires a composite index on ({fields})"
            ),
            Self::AlreadyExists { collection, id } => {
                write!(f, "document `{id}` already exists in `{collection}`")
            }
            Self::Uninitialized {
                expected_version,
                actual_version,
            } => write!(
                f,
                "document store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid document data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// One stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub user_id: String,
    pub body: Map<String, Value>,
}

impl StoredDocument {
    /// Encodes a typed record. `id` and `userId` are mirrored into the body.
    pub fn from_record<T: Serialize>(id: &str, user_id: &str, record: &T) -> StoreResult<Self> {
        let mut body = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::InvalidData(format!(
                    "record `{id}` encoded to non-object JSON `{other}`"
                )))
            }
        };
        body.insert("id".to_string(), Value::String(id.to_string()));
        body.insert(OWNER_FIELD.to_string(), Value::String(user_id.to_string()));
        Ok(Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            body,
        })
    }

    /// Field-level patch document used with [`SetMode::Merge`].
    pub fn fields(id: &str, user_id: &str, fields: Map<String, Value>) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            body: fields,
        }
    }

    /// Decodes into a typed record, trusting row identity over body copies.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut body = self.body.clone();
        body.insert("id".to_string(), Value::String(self.id.clone()));
        body.insert(
            OWNER_FIELD.to_string(),
            Value::String(self.user_id.clone()),
        );
        serde_json::from_value(Value::Object(body)).map_err(|err| {
            StoreError::InvalidData(format!("document `{}` does not decode: {err}", self.id))
        })
    }

    pub fn field(&self, name: &str) -> &Value {
        self.body.get(name).unwrap_or(&Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl FilterOp {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Evaluates this filter against one document body.
    pub fn matches(&self, body: &Map<String, Value>) -> bool {
        let actual = body.get(self.field.as_str()).unwrap_or(&Value::Null);
        if self.value.is_null() {
            return self.op == FilterOp::Eq && actual.is_null();
        }
        if actual.is_null() {
            return false;
        }
        let ordering = compare_values(actual, &self.value);
        match self.op {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Owner-scoped query with conjunctive filters and optional ordering.
///
/// Results are ordered by `order_by` (when set) and then by document id.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub user_id: String,
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
}

impl DocumentQuery {
    pub fn owned_by(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(FieldFilter::eq(field, value))
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Whether serving this query needs a declared composite index.
    pub fn needs_index(&self) -> bool {
        !self.filters.is_empty() || self.order_by.is_some()
    }

    /// Canonical composite index key: sorted, de-duplicated field names
    /// including the owner field.
    pub fn index_key(&self) -> String {
        let mut fields: Vec<&str> = self
            .filters
            .iter()
            .map(|filter| filter.field.as_str())
            .chain(self.order_by.iter().map(|order| order.field.as_str()))
            .chain(std::iter::once(OWNER_FIELD))
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields.join(",")
    }

    /// Rejects field names that cannot be used as JSON paths.
    pub fn validate_fields(&self) -> StoreResult<()> {
        let names = self
            .filters
            .iter()
            .map(|filter| filter.field.as_str())
            .chain(self.order_by.iter().map(|order| order.field.as_str()));
        for name in names {
            if !FIELD_NAME_RE.is_match(name) {
                return Err(StoreError::InvalidData(format!(
                    "unsupported query field `{name}`"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, document: &StoredDocument) -> bool {
        document.user_id == self.user_id
            && self
                .filters
                .iter()
                .all(|filter| filter.matches(&document.body))
    }

    /// Applies filters and ordering in memory.
    pub fn apply(&self, documents: Vec<StoredDocument>) -> Vec<StoredDocument> {
        let mut selected: Vec<StoredDocument> = documents
            .into_iter()
            .filter(|document| self.matches(document))
            .collect();
        selected.sort_by(|left, right| {
            let by_field = match &self.order_by {
                Some(order) => {
                    let ordering =
                        compare_values(left.field(&order.field), right.field(&order.field));
                    match order.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                }
                None => Ordering::Equal,
            };
            by_field.then_with(|| left.id.cmp(&right.id))
        });
        selected
    }
}

/// Compares JSON scalars the way SQLite compares `json_extract` results.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    let class_order = type_class(left).cmp(&type_class(right));
    if class_order != Ordering::Equal {
        return class_order;
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => match (numeric(left), numeric(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => left.to_string().cmp(&right.to_string()),
        },
    }
}

fn type_class(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) | Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) | Value::Object(_) => 3,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

/// How a document write treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole body.
    Replace,
    /// Overwrite only the top-level fields present in the write.
    Merge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create {
        collection: String,
        document: StoredDocument,
    },
    Set {
        collection: String,
        document: StoredDocument,
        mode: SetMode,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Writes applied atomically by [`DocumentStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, collection: &str, document: StoredDocument) -> &mut Self {
        self.ops.push(WriteOp::Create {
            collection: collection.to_string(),
            document,
        });
        self
    }

    pub fn set(&mut self, collection: &str, document: StoredDocument, mode: SetMode) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            document,
            mode,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Document persistence contract.
pub trait DocumentStore {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>>;
    /// Inserts a new document; fails with `AlreadyExists` on id collision.
    fn create(&self, collection: &str, document: &StoredDocument) -> StoreResult<()>;
    fn set(&self, collection: &str, document: &StoredDocument, mode: SetMode) -> StoreResult<()>;
    /// Returns whether a document was removed.
    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
    /// Indexed query; may fail with `IndexMissing`.
    fn query(&self, collection: &str, query: &DocumentQuery) -> StoreResult<Vec<StoredDocument>>;
    /// Every document of `user_id` in `collection`, ordered by id.
    fn scan_owned(&self, collection: &str, user_id: &str) -> StoreResult<Vec<StoredDocument>>;
}
