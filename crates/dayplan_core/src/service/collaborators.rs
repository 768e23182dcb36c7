//! Narrow interfaces to systems the day plan does not own.

use crate::repo::document_store::{collections, DocumentStore, StoreResult};
use log::{info, warn};
use serde::Serialize;

/// Answers whether a pillar id may be referenced by `user_id`.
pub trait PillarValidator {
    fn pillar_exists(&self, user_id: &str, pillar_id: &str) -> StoreResult<bool>;
}

/// Checks the `pillars` collection: owned by the caller and not archived.
pub struct StorePillarValidator<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DocumentStore + ?Sized> StorePillarValidator<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }
}

impl<S: DocumentStore + ?Sized> PillarValidator for StorePillarValidator<'_, S> {
    fn pillar_exists(&self, user_id: &str, pillar_id: &str) -> StoreResult<bool> {
        Ok(match self.store.get(collections::PILLARS, pillar_id)? {
            Some(document) => {
                document.user_id == user_id && document.field("archivedAt").is_null()
            }
            None => false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPlanEventKind {
    BlockCreated,
    BlockUpdated,
    BlockMoved,
    BlockDeleted,
}

impl DayPlanEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockCreated => "block_created",
            Self::BlockUpdated => "block_updated",
            Self::BlockMoved => "block_moved",
            Self::BlockDeleted => "block_deleted",
        }
    }
}

/// Notification published after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlanEvent {
    pub kind: DayPlanEventKind,
    pub user_id: String,
    pub date: String,
    pub block_id: String,
    pub projected: bool,
    pub at_ms: i64,
}

/// Receiver of day plan events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DayPlanEvent) -> Result<(), String>;
}

/// Sink that only writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &DayPlanEvent) -> Result<(), String> {
        info!(
            "event={} module=events status=ok date={} block_id={} projected={}",
            event.kind.as_str(),
            event.date,
            event.block_id,
            event.projected
        );
        Ok(())
    }
}

/// Emits `event`, logging and swallowing sink failures.
pub fn emit_best_effort(sink: &dyn EventSink, event: &DayPlanEvent) {
    if let Err(err) = sink.emit(event) {
        warn!(
            "event=event_emit module=events status=error kind={} block_id={} error={err}",
            event.kind.as_str(),
            event.block_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{emit_best_effort, DayPlanEvent, DayPlanEventKind, EventSink};

    struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&self, _event: &DayPlanEvent) -> Result<(), String> {
            Err("broker offline".to_string())
        }
    }

    #[test]
    fn best_effort_emit_swallows_failures() {
        let event = DayPlanEvent {
            kind: DayPlanEventKind::BlockDeleted,
            user_id: "u1".to_string(),
            date: "2026-01-05".to_string(),
            block_id: "b1".to_string(),
            projected: false,
            at_ms: 1,
        };
        emit_best_effort(&FailingSink, &event);
    }
}
