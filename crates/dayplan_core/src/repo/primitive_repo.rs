//! Task, habit and habit-log persistence.
//!
//! # Invariants
//! - Primitive writes from the day plan are field-level merges; fields the
//!   day plan does not own are never rewritten.
//! - Habit logs are keyed `<habitId>_<date>`; saving twice updates in place.

use crate::model::day::DayDate;
use crate::model::primitive::{Habit, HabitLog, Task};
use crate::repo::document_store::{
    collections, DocumentQuery, DocumentStore, SetMode, StoreResult, StoredDocument, WriteBatch,
};
use crate::repo::resilient_query::query_by_filters;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Typed access to the primitives projected into days.
pub struct PrimitiveRepository<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DocumentStore + ?Sized> PrimitiveRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.store.create(
            collections::TASKS,
            &StoredDocument::from_record(&task.id, &task.user_id, task)?,
        )
    }

    pub fn get_task(&self, id: &str) -> StoreResult<Option<Task>> {
        self.store
            .get(collections::TASKS, id)?
            .map(|document| document.decode())
            .transpose()
    }

    /// Tasks of `user_id` whose `dueDate` equals `date`, archived included.
    pub fn tasks_due_on(&self, user_id: &str, date: DayDate) -> StoreResult<Vec<Task>> {
        let query = DocumentQuery::owned_by(user_id).where_eq("dueDate", date.to_string());
        decode_all(query_by_filters(self.store, collections::TASKS, &query)?)
    }

    /// Direct children of `parent_id`.
    pub fn subtasks_of(&self, user_id: &str, parent_id: &str) -> StoreResult<Vec<Task>> {
        let query = DocumentQuery::owned_by(user_id).where_eq("parentId", parent_id);
        decode_all(query_by_filters(self.store, collections::TASKS, &query)?)
    }

    pub fn merge_task_fields(&self, task: &Task, fields: Map<String, Value>) -> StoreResult<()> {
        self.store.set(
            collections::TASKS,
            &StoredDocument::fields(&task.id, &task.user_id, fields),
            SetMode::Merge,
        )
    }

    /// Deletes a task and the given subtasks in one atomic batch.
    pub fn delete_task_with_subtasks(&self, task: &Task, subtasks: &[Task]) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        for subtask in subtasks {
            batch.delete(collections::TASKS, &subtask.id);
        }
        batch.delete(collections::TASKS, &task.id);
        self.store.commit(batch)
    }

    pub fn insert_habit(&self, habit: &Habit) -> StoreResult<()> {
        self.store.create(
            collections::HABITS,
            &StoredDocument::from_record(&habit.id, &habit.user_id, habit)?,
        )
    }

    pub fn get_habit(&self, id: &str) -> StoreResult<Option<Habit>> {
        self.store
            .get(collections::HABITS, id)?
            .map(|document| document.decode())
            .transpose()
    }

    /// Habits of `user_id` flagged active; schedule matching is left to callers.
    pub fn active_habits(&self, user_id: &str) -> StoreResult<Vec<Habit>> {
        let query = DocumentQuery::owned_by(user_id).where_eq("isActive", true);
        decode_all(query_by_filters(self.store, collections::HABITS, &query)?)
    }

    pub fn merge_habit_fields(&self, habit: &Habit, fields: Map<String, Value>) -> StoreResult<()> {
        self.store.set(
            collections::HABITS,
            &StoredDocument::fields(&habit.id, &habit.user_id, fields),
            SetMode::Merge,
        )
    }

    pub fn get_log(&self, habit_id: &str, date: DayDate) -> StoreResult<Option<HabitLog>> {
        self.store
            .get(collections::HABIT_LOGS, &HabitLog::doc_id(habit_id, date))?
            .map(|document| document.decode())
            .transpose()
    }

    /// All logs of `user_id` for `date`, keyed by habit id.
    pub fn logs_for_date(
        &self,
        user_id: &str,
        date: DayDate,
    ) -> StoreResult<HashMap<String, HabitLog>> {
        let query = DocumentQuery::owned_by(user_id).where_eq("date", date.to_string());
        let logs: Vec<HabitLog> =
            decode_all(query_by_filters(self.store, collections::HABIT_LOGS, &query)?)?;
        Ok(logs
            .into_iter()
            .map(|log| (log.habit_id.clone(), log))
            .collect())
    }

    pub fn save_log(&self, log: &HabitLog) -> StoreResult<()> {
        self.store.set(
            collections::HABIT_LOGS,
            &StoredDocument::from_record(&log.id, &log.user_id, log)?,
            SetMode::Replace,
        )
    }
}

fn decode_all<T: DeserializeOwned>(documents: Vec<StoredDocument>) -> StoreResult<Vec<T>> {
    documents.iter().map(StoredDocument::decode).collect()
}
