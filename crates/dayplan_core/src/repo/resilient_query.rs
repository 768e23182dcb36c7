//! Index-tolerant query entry point.
//!
//! # Responsibility
//! - Run an indexed query and, only when the store reports a missing
//!   composite index, serve the same result from an owner-scoped scan.
//!
//! # Invariants
//! - Both paths return the same documents in the same order.
//! - Only `StoreError::IndexMissing` triggers the fallback; every other
//!   error propagates unchanged.

use crate::repo::document_store::{
    DocumentQuery, DocumentStore, StoreError, StoreResult, StoredDocument,
};
use log::{debug, info};

/// Path that served a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPath {
    Indexed,
    ScanFallback,
}

impl QueryPath {
    pub fn label(self) -> &'static str {
        match self {
            Self::Indexed => "indexed",
            Self::ScanFallback => "scan_fallback",
        }
    }
}

/// Queries `collection`, falling back to a filtered scan on missing indexes.
pub fn query_by_filters<S: DocumentStore + ?Sized>(
    store: &S,
    collection: &str,
    query: &DocumentQuery,
) -> StoreResult<Vec<StoredDocument>> {
    query_with_path(store, collection, query).map(|(documents, _)| documents)
}

/// Same as [`query_by_filters`] but also reports which path ran.
pub fn query_with_path<S: DocumentStore + ?Sized>(
    store: &S,
    collection: &str,
    query: &DocumentQuery,
) -> StoreResult<(Vec<StoredDocument>, QueryPath)> {
    match store.query(collection, query) {
        Ok(documents) => {
            debug!(
                "event=query_served module=repo status=ok path={} collection={} count={}",
                QueryPath::Indexed.label(),
                collection,
                documents.len()
            );
            Ok((documents, QueryPath::Indexed))
        }
        Err(StoreError::IndexMissing { fields, .. }) => {
            let scanned = store.scan_owned(collection, &query.user_id)?;
            let scanned_count = scanned.len();
            let documents = query.apply(scanned);
            info!(
                "event=query_served module=repo status=ok path={} collection={} fields={} scanned={} count={}",
                QueryPath::ScanFallback.label(),
                collection,
                fields,
                scanned_count,
                documents.len()
            );
            Ok((documents, QueryPath::ScanFallback))
        }
        Err(err) => Err(err),
    }
}
