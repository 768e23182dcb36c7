//! Shared server state.

use crate::error::ApiError;
use dayplan_core::{
    DayPlanError, DayPlanResult, DayPlanService, EventSink, LogEventSink, SqliteDocumentStore,
    StorePillarValidator,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// One SQLite connection shared by all requests, plus the event sink.
#[derive(Clone)]
pub struct AppState {
    conn: Arc<Mutex<Connection>>,
    events: Arc<dyn EventSink>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self::with_events(conn, Arc::new(LogEventSink))
    }

    pub fn with_events(conn: Connection, events: Arc<dyn EventSink>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            events,
        }
    }

    /// Runs `op` against the document store on the blocking pool.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&SqliteDocumentStore<'c>) -> DayPlanResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ApiError::internal("database connection lock poisoned"))?;
            let store = SqliteDocumentStore::try_new(&guard).map_err(DayPlanError::from)?;
            op(&store).map_err(ApiError::from)
        })
        .await
        .map_err(|err| ApiError::internal(format!("blocking task failed: {err}")))?
    }

    /// Runs `op` against a day plan service wired to the shared store.
    pub async fn with_service<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&DayPlanService<'c, SqliteDocumentStore<'c>>) -> DayPlanResult<T>
            + Send
            + 'static,
    {
        let events = Arc::clone(&self.events);
        self.with_store(move |store| {
            let pillars = StorePillarValidator::new(store);
            let service = DayPlanService::new(store, &pillars, events.as_ref());
            op(&service)
        })
        .await
    }
}
