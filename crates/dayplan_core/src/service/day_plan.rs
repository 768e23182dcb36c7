//! Day plan reconciliation engine.
//!
//! # Responsibility
//! - Merge native and projected blocks into one canonical day view.
//! - Route single-block operations to the store that backs the id.
//! - Reconcile singleton block types with upsert-or-patch by type.
//!
//! # Invariants
//! - A block id is classified exactly once per operation.
//! - Projected edits only touch allow-listed primitive fields; everything
//!   else is rejected before any write.
//! - Event emission never fails an operation.

use crate::error::{DayPlanError, DayPlanResult};
use crate::model::block::{sort_canonical, Block, DayBlock};
use crate::model::block_ref::{BlockRef, ProjectedKind};
use crate::model::block_type::{type_availability, BlockType, TypeAvailability};
use crate::model::day::DayDate;
use crate::model::primitive::{Habit, HabitLog, Task, TaskStatus};
use crate::repo::document_store::DocumentStore;
use crate::repo::primitive_repo::PrimitiveRepository;
use crate::service::collaborators::{
    emit_best_effort, DayPlanEvent, DayPlanEventKind, EventSink, PillarValidator,
};
use crate::service::display::ResolvedBlock;
use crate::service::native_blocks::{
    check_order, parse_section, resolve_pillar, seeded_payload, NativeBlockStore,
};
use crate::service::payload::{violation_details, FieldViolation};
use crate::service::projection::{habit_block, task_block, ProjectionSynthesizer};
use crate::service::requests::{BlockFilter, BlockPatch, MoveRequest, NewBlock, RequestContext};
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

const TODO_DATA_FIELDS: &[&str] = &["title", "status", "description"];
const HABIT_DATA_FIELDS: &[&str] = &["name", "completed", "value", "notes"];

/// What a delete did to the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeleteEffect {
    /// Native block document removed.
    BlockRemoved,
    /// Task removed along with its direct subtasks.
    TaskRemoved { subtasks: usize },
    /// Habit deactivated and archived.
    HabitArchived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedBlock {
    pub id: String,
    pub effect: DeleteEffect,
}

/// Result of a by-type reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum ByTypeOutcome {
    Created(DayBlock),
    Updated(DayBlock),
}

impl ByTypeOutcome {
    pub fn block(&self) -> &DayBlock {
        match self {
            Self::Created(block) | Self::Updated(block) => block,
        }
    }

    pub fn into_block(self) -> DayBlock {
        match self {
            Self::Created(block) | Self::Updated(block) => block,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Entry point for every day plan operation.
pub struct DayPlanService<'s, S: DocumentStore + ?Sized> {
    native: NativeBlockStore<'s, S>,
    projection: ProjectionSynthesizer<'s, S>,
    primitives: PrimitiveRepository<'s, S>,
    pillars: &'s dyn PillarValidator,
    events: &'s dyn EventSink,
}

impl<'s, S: DocumentStore + ?Sized> DayPlanService<'s, S> {
    pub fn new(
        store: &'s S,
        pillars: &'s dyn PillarValidator,
        events: &'s dyn EventSink,
    ) -> Self {
        Self {
            native: NativeBlockStore::new(store, pillars),
            projection: ProjectionSynthesizer::new(store),
            primitives: PrimitiveRepository::new(store),
            pillars,
            events,
        }
    }

    /// Native and projected blocks of `date` in canonical order.
    pub fn list_blocks(
        &self,
        user_id: &str,
        date: DayDate,
        filter: &BlockFilter,
    ) -> DayPlanResult<Vec<DayBlock>> {
        let mut blocks: Vec<DayBlock> = self
            .native
            .list_for_date(user_id, date)?
            .into_iter()
            .map(DayBlock::Native)
            .collect();
        blocks.extend(self.projection.projected_blocks_for(user_id, date)?);

        blocks.retain(|day_block| {
            let block = day_block.block();
            filter
                .section_id
                .map_or(true, |section| block.section_id == section)
                && filter
                    .type_id
                    .as_deref()
                    .map_or(true, |type_id| block.type_id == type_id)
        });
        sort_canonical(&mut blocks);
        Ok(blocks)
    }

    /// Listing with optional display decoration per block type.
    pub fn list_resolved(
        &self,
        user_id: &str,
        date: DayDate,
        filter: &BlockFilter,
        resolve: bool,
    ) -> DayPlanResult<Vec<ResolvedBlock>> {
        let blocks = self.list_blocks(user_id, date, filter)?;
        if !resolve {
            return Ok(blocks
                .into_iter()
                .map(|block| ResolvedBlock::decorate(block, None))
                .collect());
        }

        let mut types: HashMap<String, Option<BlockType>> = HashMap::new();
        let mut resolved = Vec::with_capacity(blocks.len());
        for block in blocks {
            let type_id = block.block().type_id.clone();
            if !types.contains_key(&type_id) {
                let found = self.native.registry().resolve(user_id, &type_id)?;
                types.insert(type_id.clone(), found);
            }
            let block_type = types.get(&type_id).and_then(Option::as_ref);
            resolved.push(ResolvedBlock::decorate(block, block_type));
        }
        Ok(resolved)
    }

    pub fn create_block(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        request: NewBlock,
    ) -> DayPlanResult<DayBlock> {
        let block = self.native.create(ctx, date, request)?;
        self.emit(ctx, DayPlanEventKind::BlockCreated, &block, false);
        Ok(DayBlock::Native(block))
    }

    pub fn get_block(
        &self,
        user_id: &str,
        date: DayDate,
        raw_id: &str,
    ) -> DayPlanResult<DayBlock> {
        match BlockRef::parse(raw_id)? {
            BlockRef::Native(id) => {
                let block = self.native.get_by_id(user_id, date, &id)?;
                Ok(DayBlock::Native(block))
            }
            BlockRef::Projected { kind, primitive_id } => {
                self.reproject(user_id, date, kind, &primitive_id)
            }
        }
    }

    pub fn patch_block(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        raw_id: &str,
        patch: BlockPatch,
    ) -> DayPlanResult<DayBlock> {
        let block = match BlockRef::parse(raw_id)? {
            BlockRef::Native(id) => DayBlock::Native(self.native.patch(ctx, date, &id, patch)?),
            BlockRef::Projected {
                kind: ProjectedKind::Todo,
                primitive_id,
            } => self.patch_projected_todo(ctx, date, &primitive_id, patch)?,
            BlockRef::Projected {
                kind: ProjectedKind::Habit,
                primitive_id,
            } => self.patch_projected_habit(ctx, date, &primitive_id, patch)?,
        };
        self.emit(
            ctx,
            DayPlanEventKind::BlockUpdated,
            block.block(),
            block.is_projected(),
        );
        Ok(block)
    }

    pub fn move_block(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        raw_id: &str,
        request: &MoveRequest,
    ) -> DayPlanResult<DayBlock> {
        let block = match BlockRef::parse(raw_id)? {
            BlockRef::Native(id) => {
                DayBlock::Native(self.native.move_block(ctx, date, &id, request)?)
            }
            BlockRef::Projected { kind, primitive_id } => {
                let section_id = parse_section(&request.section_id)?;
                check_order(request.order)?;
                let mut fields = Map::new();
                fields.insert("sectionId".to_string(), Value::from(section_id.as_str()));
                fields.insert("order".to_string(), Value::from(request.order));
                match kind {
                    ProjectedKind::Todo => {
                        let task = self.require_task(&ctx.user_id, date, &primitive_id)?;
                        self.primitives.merge_task_fields(&task, fields)?;
                    }
                    ProjectedKind::Habit => {
                        let habit = self.require_habit(&ctx.user_id, date, &primitive_id)?;
                        self.primitives.merge_habit_fields(&habit, fields)?;
                    }
                }
                info!(
                    "event=block_move module=service status=ok date={date} block_id={raw_id} section={section_id}"
                );
                self.reproject(&ctx.user_id, date, kind, &primitive_id)?
            }
        };
        self.emit(
            ctx,
            DayPlanEventKind::BlockMoved,
            block.block(),
            block.is_projected(),
        );
        Ok(block)
    }

    pub fn delete_block(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        raw_id: &str,
    ) -> DayPlanResult<DeletedBlock> {
        let (block, effect, projected) = match BlockRef::parse(raw_id)? {
            BlockRef::Native(id) => {
                let block = self.native.delete(&ctx.user_id, date, &id)?;
                (block, DeleteEffect::BlockRemoved, false)
            }
            BlockRef::Projected {
                kind: ProjectedKind::Todo,
                primitive_id,
            } => {
                let task = self.require_task(&ctx.user_id, date, &primitive_id)?;
                let subtasks = self.primitives.subtasks_of(&ctx.user_id, &task.id)?;
                self.primitives.delete_task_with_subtasks(&task, &subtasks)?;
                info!(
                    "event=task_delete module=service status=ok task_id={} subtasks={}",
                    task.id,
                    subtasks.len()
                );
                let block = task_block(&task, date);
                (
                    block,
                    DeleteEffect::TaskRemoved {
                        subtasks: subtasks.len(),
                    },
                    true,
                )
            }
            BlockRef::Projected {
                kind: ProjectedKind::Habit,
                primitive_id,
            } => {
                let habit = self.require_habit(&ctx.user_id, date, &primitive_id)?;
                let mut fields = Map::new();
                fields.insert("isActive".to_string(), Value::Bool(false));
                fields.insert("archivedAt".to_string(), Value::from(ctx.now_ms));
                self.primitives.merge_habit_fields(&habit, fields)?;
                info!(
                    "event=habit_archive module=service status=ok habit_id={}",
                    habit.id
                );
                let log = HabitLog::default_for(&habit, date);
                let block = habit_block(&habit, &log, date);
                (block, DeleteEffect::HabitArchived, true)
            }
        };
        self.emit(ctx, DayPlanEventKind::BlockDeleted, &block, projected);
        Ok(DeletedBlock {
            id: block.id,
            effect,
        })
    }

    /// Creates the single block of a singleton type for `date`, or patches
    /// the existing one.
    ///
    /// The zero/one/many check and the write are not one transaction: two
    /// concurrent first calls can both create.
    pub fn upsert_by_type(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        type_id: &str,
        patch: BlockPatch,
    ) -> DayPlanResult<ByTypeOutcome> {
        let type_id = type_id.trim();
        match type_availability(type_id) {
            TypeAvailability::Writable => {}
            TypeAvailability::Disabled => {
                return Err(DayPlanError::Unsupported(format!(
                    "block type `{type_id}` is no longer supported"
                )));
            }
            TypeAvailability::Reserved => {
                return Err(DayPlanError::validation(format!(
                    "block type `{type_id}` is projected and cannot be upserted by type"
                )));
            }
        }
        let block_type = self
            .native
            .registry()
            .resolve(&ctx.user_id, type_id)?
            .ok_or_else(|| DayPlanError::not_found(format!("block type `{type_id}` not found")))?;
        if block_type.allow_multiple {
            return Err(DayPlanError::conflict(format!(
                "block type `{type_id}` allows multiple blocks per day"
            )));
        }

        let mut existing = self.native.list_of_type(&ctx.user_id, date, type_id)?;
        match existing.len() {
            0 => {
                let request = NewBlock {
                    id: None,
                    type_id: type_id.to_string(),
                    section_id: patch.section_id,
                    order: patch.order,
                    is_expanded: patch.is_expanded,
                    title: patch.title,
                    subtitle: patch.subtitle,
                    icon: patch.icon,
                    source: None,
                    pillar_id: patch.pillar_id.flatten(),
                    data: Some(seeded_payload(&block_type, patch.data.as_ref())),
                };
                let block = self.create_block(ctx, date, request)?;
                info!(
                    "event=by_type_upsert module=service status=ok outcome=created type_id={type_id} date={date}"
                );
                Ok(ByTypeOutcome::Created(block))
            }
            1 => {
                let current = existing.remove(0);
                let block = self.patch_block(ctx, date, &current.id, patch)?;
                info!(
                    "event=by_type_upsert module=service status=ok outcome=updated type_id={type_id} date={date}"
                );
                Ok(ByTypeOutcome::Updated(block))
            }
            count => Err(DayPlanError::conflict(format!(
                "{count} blocks of type `{type_id}` exist on {date}"
            ))),
        }
    }

    fn patch_projected_todo(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        task_id: &str,
        patch: BlockPatch,
    ) -> DayPlanResult<DayBlock> {
        let task = self.require_task(&ctx.user_id, date, task_id)?;
        let data = patch.data.clone().unwrap_or_default();
        let mut violations = rejected_common_fields(&patch);
        violations.extend(rejected_data_fields(&data, TODO_DATA_FIELDS));

        let mut fields = Map::new();
        self.collect_placement(ctx, &patch, &mut fields)?;

        let title = match data.get("title") {
            Some(value) => Some(required_text(value, "data.title", &mut violations)),
            None => patch
                .title
                .as_ref()
                .map(|title| required_text(&Value::from(title.as_str()), "title", &mut violations)),
        };
        if let Some(Some(content)) = title {
            fields.insert("content".to_string(), Value::from(content));
        }
        match data.get("description") {
            Some(Value::Null) => {
                fields.insert("description".to_string(), Value::Null);
            }
            Some(Value::String(text)) => {
                fields.insert("description".to_string(), Value::from(text.trim()));
            }
            Some(_) => violations.push(FieldViolation::new(
                "data.description",
                "must be a string or null",
            )),
            None => {}
        }
        if let Some(raw) = data.get("status") {
            match raw.as_str().and_then(TaskStatus::parse) {
                Some(status) => apply_task_status(&task, status, ctx.now_ms, &mut fields),
                None => violations.push(FieldViolation::new(
                    "data.status",
                    "must be one of: active, completed",
                )),
            }
        }

        reject_violations(violations)?;
        if !fields.is_empty() {
            self.primitives.merge_task_fields(&task, fields)?;
        }
        self.reproject(&ctx.user_id, date, ProjectedKind::Todo, task_id)
    }

    fn patch_projected_habit(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        habit_id: &str,
        patch: BlockPatch,
    ) -> DayPlanResult<DayBlock> {
        let habit = self.require_habit(&ctx.user_id, date, habit_id)?;
        let data = patch.data.clone().unwrap_or_default();
        let mut violations = rejected_common_fields(&patch);
        violations.extend(rejected_data_fields(&data, HABIT_DATA_FIELDS));

        let mut fields = Map::new();
        self.collect_placement(ctx, &patch, &mut fields)?;

        let name = match data.get("name") {
            Some(value) => Some(required_text(value, "data.name", &mut violations)),
            None => patch
                .title
                .as_ref()
                .map(|title| required_text(&Value::from(title.as_str()), "title", &mut violations)),
        };
        if let Some(Some(name)) = name {
            fields.insert("name".to_string(), Value::from(name));
        }

        let mut log_touched = false;
        let mut log = self
            .primitives
            .get_log(&habit.id, date)?
            .unwrap_or_else(|| HabitLog::default_for(&habit, date));
        match data.get("completed") {
            Some(Value::Bool(completed)) => {
                log.completed = *completed;
                log_touched = true;
            }
            Some(_) => violations.push(FieldViolation::new("data.completed", "must be a boolean")),
            None => {}
        }
        match data.get("value") {
            Some(Value::Null) => {
                log.value = None;
                log_touched = true;
            }
            Some(Value::Number(number)) => {
                log.value = number.as_f64();
                log_touched = true;
            }
            Some(_) => violations.push(FieldViolation::new(
                "data.value",
                "must be a number or null",
            )),
            None => {}
        }
        match data.get("notes") {
            Some(Value::String(notes)) => {
                log.notes = notes.trim().to_string();
                log_touched = true;
            }
            Some(_) => violations.push(FieldViolation::new("data.notes", "must be a string")),
            None => {}
        }

        reject_violations(violations)?;
        if !fields.is_empty() {
            self.primitives.merge_habit_fields(&habit, fields)?;
        }
        if log_touched {
            log.updated_at = ctx.now_ms;
            self.primitives.save_log(&log)?;
            info!(
                "event=habit_log_save module=service status=ok habit_id={} date={date} completed={}",
                habit.id, log.completed
            );
        }
        self.reproject(&ctx.user_id, date, ProjectedKind::Habit, habit_id)
    }

    /// Section, order and pillar edits shared by both projected kinds.
    fn collect_placement(
        &self,
        ctx: &RequestContext,
        patch: &BlockPatch,
        fields: &mut Map<String, Value>,
    ) -> DayPlanResult<()> {
        if let Some(raw) = patch.section_id.as_deref() {
            let section_id = parse_section(raw)?;
            fields.insert("sectionId".to_string(), Value::from(section_id.as_str()));
        }
        if let Some(order) = patch.order {
            check_order(order)?;
            fields.insert("order".to_string(), Value::from(order));
        }
        if let Some(pillar) = patch.pillar_id.as_ref() {
            let pillar_id = resolve_pillar(self.pillars, &ctx.user_id, pillar.as_deref())?;
            fields.insert(
                "pillarId".to_string(),
                pillar_id.map_or(Value::Null, Value::from),
            );
        }
        Ok(())
    }

    fn require_task(&self, user_id: &str, date: DayDate, task_id: &str) -> DayPlanResult<Task> {
        self.projection
            .eligible_task(user_id, date, task_id)?
            .ok_or_else(|| projected_not_found(ProjectedKind::Todo, task_id, date))
    }

    fn require_habit(
        &self,
        user_id: &str,
        date: DayDate,
        habit_id: &str,
    ) -> DayPlanResult<Habit> {
        self.projection
            .eligible_habit(user_id, date, habit_id)?
            .ok_or_else(|| projected_not_found(ProjectedKind::Habit, habit_id, date))
    }

    fn reproject(
        &self,
        user_id: &str,
        date: DayDate,
        kind: ProjectedKind,
        primitive_id: &str,
    ) -> DayPlanResult<DayBlock> {
        self.projection
            .project_one(user_id, date, kind, primitive_id)?
            .ok_or_else(|| projected_not_found(kind, primitive_id, date))
    }

    fn emit(&self, ctx: &RequestContext, kind: DayPlanEventKind, block: &Block, projected: bool) {
        let event = DayPlanEvent {
            kind,
            user_id: ctx.user_id.clone(),
            date: block.date.to_string(),
            block_id: block.id.clone(),
            projected,
            at_ms: ctx.now_ms,
        };
        emit_best_effort(self.events, &event);
    }
}

fn projected_not_found(kind: ProjectedKind, primitive_id: &str, date: DayDate) -> DayPlanError {
    DayPlanError::not_found(format!("{} `{primitive_id}` is not part of {date}", kind.label()))
}

/// Block-level fields that projected blocks never accept.
fn rejected_common_fields(patch: &BlockPatch) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    if patch.is_expanded.is_some() {
        violations.push(FieldViolation::new("isExpanded", "not editable on projected blocks"));
    }
    if patch.subtitle.is_some() {
        violations.push(FieldViolation::new("subtitle", "not editable on projected blocks"));
    }
    if patch.icon.is_some() {
        violations.push(FieldViolation::new("icon", "not editable on projected blocks"));
    }
    violations
}

fn rejected_data_fields(data: &Map<String, Value>, allowed: &[&str]) -> Vec<FieldViolation> {
    data.keys()
        .filter(|key| !allowed.contains(&key.as_str()))
        .map(|key| {
            FieldViolation::new(
                &format!("data.{key}"),
                "not editable on projected blocks",
            )
        })
        .collect()
}

/// Trimmed non-empty text, or a recorded violation.
fn required_text(
    value: &Value,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match value.as_str().map(str::trim) {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        Some(_) => {
            violations.push(FieldViolation::new(field, "cannot be empty"));
            None
        }
        None => {
            violations.push(FieldViolation::new(field, "must be a string"));
            None
        }
    }
}

fn apply_task_status(
    task: &Task,
    status: TaskStatus,
    now_ms: i64,
    fields: &mut Map<String, Value>,
) {
    fields.insert("status".to_string(), Value::from(status.as_str()));
    match status {
        TaskStatus::Completed => {
            if task.completed_at.is_none() {
                fields.insert("completedAt".to_string(), Value::from(now_ms));
            }
        }
        TaskStatus::Active => {
            fields.insert("completedAt".to_string(), Value::Null);
        }
    }
}

fn reject_violations(violations: Vec<FieldViolation>) -> DayPlanResult<()> {
    if violations.is_empty() {
        return Ok(());
    }
    Err(DayPlanError::validation_with(
        "patch contains fields projected blocks do not accept",
        violation_details(&violations),
    ))
}
