//! Native block persistence.

use crate::model::block::Block;
use crate::model::day::DayDate;
use crate::repo::document_store::{
    collections, DocumentQuery, DocumentStore, SetMode, StoreResult, StoredDocument,
};
use crate::repo::resilient_query::query_by_filters;

/// Typed access to `day_blocks` documents.
pub struct BlockRepository<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DocumentStore + ?Sized> BlockRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<Block>> {
        self.store
            .get(collections::DAY_BLOCKS, id)?
            .map(|document| document.decode())
            .transpose()
    }

    /// Inserts a new block; id collisions surface as `AlreadyExists`.
    pub fn insert(&self, block: &Block) -> StoreResult<()> {
        self.store.create(collections::DAY_BLOCKS, &encode(block)?)
    }

    pub fn replace(&self, block: &Block) -> StoreResult<()> {
        self.store
            .set(collections::DAY_BLOCKS, &encode(block)?, SetMode::Replace)
    }

    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(collections::DAY_BLOCKS, id)
    }

    /// All stored blocks of `user_id` for `date`, unsorted.
    pub fn list_for_date(&self, user_id: &str, date: DayDate) -> StoreResult<Vec<Block>> {
        let query = DocumentQuery::owned_by(user_id).where_eq("date", date.to_string());
        query_by_filters(self.store, collections::DAY_BLOCKS, &query)?
            .iter()
            .map(StoredDocument::decode)
            .collect()
    }
}

fn encode(block: &Block) -> StoreResult<StoredDocument> {
    StoredDocument::from_record(&block.id, &block.user_id, block)
}
