use dayplan_core::db::open_db_in_memory;
use dayplan_core::repo::document_store::{
    collections, DocumentQuery, DocumentStore, FieldFilter, FilterOp, SortDirection, StoreError,
    StoredDocument,
};
use dayplan_core::repo::resilient_query::{query_by_filters, query_with_path, QueryPath};
use dayplan_core::SqliteDocumentStore;
use serde_json::{json, Value};

fn seed(store: &SqliteDocumentStore<'_>, user_id: &str, id: &str, body: Value) {
    let Value::Object(fields) = body else {
        panic!("body must be an object");
    };
    store
        .create(collections::TASKS, &StoredDocument::fields(id, user_id, fields))
        .unwrap();
}

fn ids(documents: &[StoredDocument]) -> Vec<String> {
    documents.iter().map(|document| document.id.clone()).collect()
}

#[test]
fn indexed_and_fallback_paths_return_identical_results() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    seed(&store, "u1", "t3", json!({"dueDate": "2026-01-05", "order": 2}));
    seed(&store, "u1", "t1", json!({"dueDate": "2026-01-05", "order": 1}));
    seed(&store, "u1", "t2", json!({"dueDate": "2026-01-06", "order": 0}));
    seed(&store, "u2", "t4", json!({"dueDate": "2026-01-05", "order": 0}));

    let query = DocumentQuery::owned_by("u1").where_eq("dueDate", "2026-01-05");
    let (indexed, path) = query_with_path(&store, collections::TASKS, &query).unwrap();
    assert_eq!(path, QueryPath::Indexed);

    assert!(store.drop_index(collections::TASKS, &["dueDate"]).unwrap());
    let (scanned, path) = query_with_path(&store, collections::TASKS, &query).unwrap();
    assert_eq!(path, QueryPath::ScanFallback);

    assert_eq!(ids(&indexed), ids(&scanned));
    assert_eq!(ids(&scanned), vec!["t1", "t3"]);
}

#[test]
fn undeclared_index_raises_index_missing_on_direct_query() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let query = DocumentQuery::owned_by("u1").where_eq("isActive", true);

    let err = store.query(collections::HABITS, &query).unwrap_err();
    assert!(matches!(err, StoreError::IndexMissing { .. }));

    let found = query_by_filters(&store, collections::HABITS, &query).unwrap();
    assert!(found.is_empty());
}

#[test]
fn fallback_applies_range_filters_and_ordering() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    seed(&store, "u1", "a", json!({"priority": 5}));
    seed(&store, "u1", "b", json!({"priority": 1}));
    seed(&store, "u1", "c", json!({"priority": 3}));
    seed(&store, "u1", "d", json!({}));

    let query = DocumentQuery::owned_by("u1")
        .filter(FieldFilter::new("priority", FilterOp::Gte, 2))
        .order_by("priority", SortDirection::Desc);
    let (found, path) = query_with_path(&store, collections::TASKS, &query).unwrap();

    assert_eq!(path, QueryPath::ScanFallback);
    assert_eq!(ids(&found), vec!["a", "c"]);
}

#[test]
fn fallback_never_leaks_other_owners() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    seed(&store, "u1", "mine", json!({"label": "x"}));
    seed(&store, "u2", "theirs", json!({"label": "x"}));

    let query = DocumentQuery::owned_by("u1").where_eq("label", "x");
    let found = query_by_filters(&store, collections::TASKS, &query).unwrap();

    assert_eq!(ids(&found), vec!["mine"]);
    assert!(found.iter().all(|document| document.user_id == "u1"));
}

#[test]
fn other_store_errors_propagate_without_fallback() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let query = DocumentQuery::owned_by("u1").where_eq("bad field;", "x");

    let err = query_by_filters(&store, collections::TASKS, &query).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}
