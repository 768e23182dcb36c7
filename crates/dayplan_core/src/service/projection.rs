//! Projection of tasks and habits into a day.
//!
//! # Responsibility
//! - Render eligible primitives for a date as read-only projected blocks.
//! - Re-derive a single projected block for get-by-id and post-mutation reads.
//!
//! # Invariants
//! - Projected ids are `proj_todo_<taskId>` / `proj_habit_<habitId>`.
//! - Projected blocks carry `createdAt = 0` and are never persisted.
//! - Eligibility is recomputed on every read; nothing is cached.

use crate::model::block::{Block, BlockSource, DayBlock};
use crate::model::block_ref::ProjectedKind;
use crate::model::block_type::{PROJECTED_HABIT_TYPE, PROJECTED_TODO_TYPE};
use crate::model::day::DayDate;
use crate::model::primitive::{Habit, HabitLog, Task};
use crate::model::section::SectionId;
use crate::repo::document_store::{DocumentStore, StoreResult};
use crate::repo::primitive_repo::PrimitiveRepository;
use log::debug;
use serde_json::{json, Map, Value};

const TODO_ICON: &str = "check-square";
const HABIT_ICON: &str = "repeat";

/// Builds projected blocks from primitives.
pub struct ProjectionSynthesizer<'s, S: DocumentStore + ?Sized> {
    primitives: PrimitiveRepository<'s, S>,
}

impl<'s, S: DocumentStore + ?Sized> ProjectionSynthesizer<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            primitives: PrimitiveRepository::new(store),
        }
    }

    /// Every projected block of `user_id` for `date`, unsorted.
    pub fn projected_blocks_for(&self, user_id: &str, date: DayDate) -> StoreResult<Vec<DayBlock>> {
        let tasks = self.primitives.tasks_due_on(user_id, date)?;
        let mut blocks: Vec<DayBlock> = tasks
            .iter()
            .filter(|task| task.is_eligible_on(date))
            .map(|task| DayBlock::Projected(task_block(task, date)))
            .collect();

        let habits: Vec<Habit> = self
            .primitives
            .active_habits(user_id)?
            .into_iter()
            .filter(|habit| habit.is_eligible_on(date))
            .collect();
        if !habits.is_empty() {
            let mut logs = self.primitives.logs_for_date(user_id, date)?;
            for habit in &habits {
                let log = logs
                    .remove(&habit.id)
                    .unwrap_or_else(|| HabitLog::default_for(habit, date));
                blocks.push(DayBlock::Projected(habit_block(habit, &log, date)));
            }
        }

        debug!(
            "event=projection_built module=service status=ok date={date} tasks={} habits={}",
            tasks.len(),
            habits.len()
        );
        Ok(blocks)
    }

    /// Re-derives one projected block; `None` when the primitive is missing,
    /// owned by someone else, or not eligible on `date`.
    pub fn project_one(
        &self,
        user_id: &str,
        date: DayDate,
        kind: ProjectedKind,
        primitive_id: &str,
    ) -> StoreResult<Option<DayBlock>> {
        match kind {
            ProjectedKind::Todo => Ok(self
                .eligible_task(user_id, date, primitive_id)?
                .map(|task| DayBlock::Projected(task_block(&task, date)))),
            ProjectedKind::Habit => {
                let Some(habit) = self.eligible_habit(user_id, date, primitive_id)? else {
                    return Ok(None);
                };
                let log = self
                    .primitives
                    .get_log(&habit.id, date)?
                    .unwrap_or_else(|| HabitLog::default_for(&habit, date));
                Ok(Some(DayBlock::Projected(habit_block(&habit, &log, date))))
            }
        }
    }

    /// The task behind `proj_todo_<task_id>` if it projects onto `date`.
    pub fn eligible_task(
        &self,
        user_id: &str,
        date: DayDate,
        task_id: &str,
    ) -> StoreResult<Option<Task>> {
        Ok(self
            .primitives
            .get_task(task_id)?
            .filter(|task| task.user_id == user_id && task.is_eligible_on(date)))
    }

    /// The habit behind `proj_habit_<habit_id>` if it projects onto `date`.
    pub fn eligible_habit(
        &self,
        user_id: &str,
        date: DayDate,
        habit_id: &str,
    ) -> StoreResult<Option<Habit>> {
        Ok(self
            .primitives
            .get_habit(habit_id)?
            .filter(|habit| habit.user_id == user_id && habit.is_eligible_on(date)))
    }
}

/// Projected block of a task due on `date`.
pub fn task_block(task: &Task, date: DayDate) -> Block {
    let data = object(json!({
        "taskId": task.id,
        "title": task.content,
        "description": task.description,
        "status": task.status.as_str(),
        "completedAt": task.completed_at,
        "parentId": task.parent_id,
    }));
    Block {
        id: format!("{}{}", ProjectedKind::Todo.prefix(), task.id),
        user_id: task.user_id.clone(),
        date,
        type_id: PROJECTED_TODO_TYPE.to_string(),
        section_id: SectionId::parse_or(task.section_id.as_deref(), SectionId::Afternoon),
        order: task.order,
        is_expanded: false,
        title: task.content.clone(),
        subtitle: String::new(),
        icon: TODO_ICON.to_string(),
        pillar_id: task.pillar_id.clone(),
        source: BlockSource::AutoSync,
        data,
        created_at: 0,
        updated_at: 0,
    }
}

/// Projected block of a habit scheduled on `date`, joined with its log.
pub fn habit_block(habit: &Habit, log: &HabitLog, date: DayDate) -> Block {
    let status = if log.completed { "completed" } else { "pending" };
    let data = object(json!({
        "habitId": habit.id,
        "name": habit.name,
        "completed": log.completed,
        "value": log.value,
        "notes": log.notes,
        "status": status,
    }));
    Block {
        id: format!("{}{}", ProjectedKind::Habit.prefix(), habit.id),
        user_id: habit.user_id.clone(),
        date,
        type_id: PROJECTED_HABIT_TYPE.to_string(),
        section_id: SectionId::parse_or(habit.section_id.as_deref(), SectionId::Morning),
        order: habit.order,
        is_expanded: false,
        title: habit.name.clone(),
        subtitle: String::new(),
        icon: HABIT_ICON.to_string(),
        pillar_id: habit.pillar_id.clone(),
        source: BlockSource::AutoSync,
        data,
        created_at: 0,
        updated_at: 0,
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{habit_block, task_block};
    use crate::model::day::DayDate;
    use crate::model::primitive::{Habit, HabitLog, HabitSchedule, Task, TaskStatus};
    use crate::model::section::SectionId;
    use serde_json::json;

    #[test]
    fn task_block_defaults_to_afternoon() {
        let date = DayDate::parse("2026-01-05").unwrap();
        let mut task = Task::new("t1", "u1", "Buy milk");
        task.status = TaskStatus::Completed;
        task.completed_at = Some(42);
        task.order = 3;

        let block = task_block(&task, date);
        assert_eq!(block.id, "proj_todo_t1");
        assert_eq!(block.section_id, SectionId::Afternoon);
        assert_eq!(block.order, 3);
        assert_eq!(block.created_at, 0);
        assert_eq!(block.data["status"], json!("completed"));
        assert_eq!(block.data["completedAt"], json!(42));
        assert_eq!(block.data["parentId"], json!(null));
    }

    #[test]
    fn habit_block_reports_pending_without_log() {
        let date = DayDate::parse("2026-01-05").unwrap();
        let mut habit = Habit::new("h1", "u1", "Stretch", HabitSchedule::Daily);
        habit.section_id = Some("bogus".to_string());
        let log = HabitLog::default_for(&habit, date);

        let block = habit_block(&habit, &log, date);
        assert_eq!(block.id, "proj_habit_h1");
        assert_eq!(block.section_id, SectionId::Morning);
        assert_eq!(block.data["status"], json!("pending"));
        assert_eq!(block.data["notes"], json!(""));
        assert_eq!(block.data["value"], json!(null));
    }
}
