//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist owner-scoped JSON documents in the `documents` table.
//! - Serve filtered queries through `json_extract` when a composite index is
//!   declared in `query_indexes`.
//!
//! # Invariants
//! - Filtered queries without a declared index fail with `IndexMissing`.
//! - Batches run inside one transaction; any failing op rolls back all ops.
//! - Merge writes overwrite only the top-level fields they carry.

use crate::db::migrations::latest_version;
use crate::repo::document_store::{
    DocumentQuery, DocumentStore, FilterOp, SetMode, SortDirection, StoreError, StoreResult,
    StoredDocument, WriteBatch, WriteOp,
};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};

const DOCUMENT_SELECT_SQL: &str = "SELECT id, user_id, body FROM documents";

/// SQLite document store over a migrated connection.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Creates a store from a connection returned by `open_db*`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let actual_version =
            conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StoreError::Uninitialized {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Declares a composite query index over `fields` (owner field implied).
    pub fn declare_index(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        let key = index_key_for(fields);
        self.conn.execute(
            "INSERT OR IGNORE INTO query_indexes (collection, fields) VALUES (?1, ?2);",
            params![collection, key],
        )?;
        Ok(())
    }

    /// Removes a declared composite index. Returns whether one existed.
    pub fn drop_index(&self, collection: &str, fields: &[&str]) -> StoreResult<bool> {
        let key = index_key_for(fields);
        let changed = self.conn.execute(
            "DELETE FROM query_indexes WHERE collection = ?1 AND fields = ?2;",
            params![collection, key],
        )?;
        Ok(changed > 0)
    }

    fn index_declared(&self, collection: &str, key: &str) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM query_indexes WHERE collection = ?1 AND fields = ?2;",
                params![collection, key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        read_document(self.conn, collection, id)
    }

    fn create(&self, collection: &str, document: &StoredDocument) -> StoreResult<()> {
        insert_document(self.conn, collection, document)
    }

    fn set(&self, collection: &str, document: &StoredDocument, mode: SetMode) -> StoreResult<()> {
        match mode {
            SetMode::Replace => upsert_document(self.conn, collection, document),
            SetMode::Merge => {
                let tx = self.conn.unchecked_transaction()?;
                merge_document(&tx, collection, document)?;
                tx.commit()?;
                Ok(())
            }
        }
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        delete_document(self.conn, collection, id)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let op_count = batch.len();
        let tx = self.conn.unchecked_transaction()?;
        for op in batch.into_ops() {
            match op {
                WriteOp::Create {
                    collection,
                    document,
                } => insert_document(&tx, &collection, &document)?,
                WriteOp::Set {
                    collection,
                    document,
                    mode: SetMode::Replace,
                } => upsert_document(&tx, &collection, &document)?,
                WriteOp::Set {
                    collection,
                    document,
                    mode: SetMode::Merge,
                } => merge_document(&tx, &collection, &document)?,
                WriteOp::Delete { collection, id } => {
                    delete_document(&tx, &collection, &id)?;
                }
            }
        }
        tx.commit()?;
        debug!("event=batch_commit module=repo status=ok ops={op_count}");
        Ok(())
    }

    fn query(&self, collection: &str, query: &DocumentQuery) -> StoreResult<Vec<StoredDocument>> {
        query.validate_fields()?;
        if query.needs_index() {
            let key = query.index_key();
            if !self.index_declared(collection, &key)? {
                return Err(StoreError::IndexMissing {
                    collection: collection.to_string(),
                    fields: key,
                });
            }
        }

        let mut sql = format!("{DOCUMENT_SELECT_SQL} WHERE collection = ? AND user_id = ?");
        let mut bind_values = vec![
            SqlValue::Text(collection.to_string()),
            SqlValue::Text(query.user_id.clone()),
        ];

        for filter in &query.filters {
            let path = format!("json_extract(body, '$.{}')", filter.field);
            match to_sql_value(&filter.value)? {
                None => {
                    if filter.op != FilterOp::Eq {
                        return Err(StoreError::InvalidData(format!(
                            "range filter on `{}` cannot compare against null",
                            filter.field
                        )));
                    }
                    sql.push_str(&format!(" AND {path} IS NULL"));
                }
                Some(value) => {
                    sql.push_str(&format!(" AND {path} {} ?", filter.op.sql()));
                    bind_values.push(value);
                }
            }
        }

        match &query.order_by {
            Some(order) => {
                let direction = match order.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                sql.push_str(&format!(
                    " ORDER BY json_extract(body, '$.{}') {direction}, id ASC",
                    order.field
                ));
            }
            None => sql.push_str(" ORDER BY id ASC"),
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(
                row.get("id")?,
                row.get("user_id")?,
                row.get("body")?,
            )?);
        }
        Ok(documents)
    }

    fn scan_owned(&self, collection: &str, user_id: &str) -> StoreResult<Vec<StoredDocument>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DOCUMENT_SELECT_SQL} WHERE collection = ?1 AND user_id = ?2 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query(params![collection, user_id])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(
                row.get("id")?,
                row.get("user_id")?,
                row.get("body")?,
            )?);
        }
        Ok(documents)
    }
}

fn index_key_for(fields: &[&str]) -> String {
    let query = fields.iter().fold(DocumentQuery::owned_by(""), |query, field| {
        query.where_eq(field, Value::Null)
    });
    query.index_key()
}

fn read_document(
    conn: &Connection,
    collection: &str,
    id: &str,
) -> StoreResult<Option<StoredDocument>> {
    let row = conn
        .query_row(
            &format!("{DOCUMENT_SELECT_SQL} WHERE collection = ?1 AND id = ?2;"),
            params![collection, id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, user_id, body)) => Ok(Some(parse_document_row(id, user_id, body)?)),
        None => Ok(None),
    }
}

fn insert_document(
    conn: &Connection,
    collection: &str,
    document: &StoredDocument,
) -> StoreResult<()> {
    let body = encode_body(&document.body)?;
    let result = conn.execute(
        "INSERT INTO documents (collection, id, user_id, body) VALUES (?1, ?2, ?3, ?4);",
        params![collection, document.id, document.user_id, body],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: document.id.clone(),
            })
        }
        Err(err) => Err(err.into()),
    }
}

fn upsert_document(
    conn: &Connection,
    collection: &str,
    document: &StoredDocument,
) -> StoreResult<()> {
    let body = encode_body(&document.body)?;
    conn.execute(
        "INSERT INTO documents (collection, id, user_id, body) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (collection, id) DO UPDATE SET
            user_id = excluded.user_id,
            body = excluded.body,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![collection, document.id, document.user_id, body],
    )?;
    Ok(())
}

fn merge_document(
    conn: &Connection,
    collection: &str,
    document: &StoredDocument,
) -> StoreResult<()> {
    let mut merged = match read_document(conn, collection, &document.id)? {
        Some(existing) => existing.body,
        None => Map::new(),
    };
    for (field, value) in &document.body {
        merged.insert(field.clone(), value.clone());
    }
    upsert_document(
        conn,
        collection,
        &StoredDocument {
            id: document.id.clone(),
            user_id: document.user_id.clone(),
            body: merged,
        },
    )
}

fn delete_document(conn: &Connection, collection: &str, id: &str) -> StoreResult<bool> {
    let changed = conn.execute(
        "DELETE FROM documents WHERE collection = ?1 AND id = ?2;",
        params![collection, id],
    )?;
    Ok(changed > 0)
}

fn encode_body(body: &Map<String, Value>) -> StoreResult<String> {
    Ok(serde_json::to_string(body)?)
}

fn parse_document_row(id: String, user_id: String, body: String) -> StoreResult<StoredDocument> {
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(body)) => Ok(StoredDocument { id, user_id, body }),
        Ok(_) => Err(StoreError::InvalidData(format!(
            "document `{id}` body is not a JSON object"
        ))),
        Err(err) => Err(StoreError::InvalidData(format!(
            "document `{id}` body is not valid JSON: {err}"
        ))),
    }
}

fn to_sql_value(value: &Value) -> StoreResult<Option<SqlValue>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(flag) => Ok(Some(SqlValue::Integer(i64::from(*flag)))),
        Value::Number(number) => match number.as_i64() {
            Some(int) => Ok(Some(SqlValue::Integer(int))),
            None => number
                .as_f64()
                .map(|float| Some(SqlValue::Real(float)))
                .ok_or_else(|| StoreError::InvalidData(format!("unsupported number `{number}`"))),
        },
        Value::String(text) => Ok(Some(SqlValue::Text(text.clone()))),
        other => Err(StoreError::InvalidData(format!(
            "filter value `{other}` must be a scalar"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{index_key_for, SqliteDocumentStore};
    use crate::db::open_db_in_memory;
    use crate::repo::document_store::{DocumentStore, SetMode, StoreError, StoredDocument};
    use serde_json::json;

    fn doc(id: &str, body: serde_json::Value) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            user_id: "u1".to_string(),
            body: body.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn index_key_matches_query_key_shape() {
        assert_eq!(index_key_for(&["userId", "date"]), "date,userId");
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::try_new(&conn).unwrap();
        store.create("notes", &doc("n1", json!({"a": 1}))).unwrap();
        let err = store
            .create("notes", &doc("n1", json!({"a": 2})))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[test]
    fn merge_overwrites_only_present_fields() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::try_new(&conn).unwrap();
        store
            .create("notes", &doc("n1", json!({"a": 1, "b": {"x": 1}})))
            .unwrap();
        store
            .set("notes", &doc("n1", json!({"b": {"y": 2}})), SetMode::Merge)
            .unwrap();
        let loaded = store.get("notes", "n1").unwrap().unwrap();
        assert_eq!(loaded.body["a"], 1);
        assert_eq!(loaded.body["b"], json!({"y": 2}));
    }
}
