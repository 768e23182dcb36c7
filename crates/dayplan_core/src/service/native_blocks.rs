//! Native block store.
//!
//! # Responsibility
//! - CRUD over blocks persisted for a date.
//! - Normalize section, order and pillar references; validate payloads
//!   through the block type registry.
//!
//! # Invariants
//! - Reserved and disabled type ids are rejected before storage is touched.
//! - A block is visible only to its owner and only on its own date.
//! - `order` is never negative.

use crate::error::{DayPlanError, DayPlanResult};
use crate::model::block::Block;
use crate::model::block_ref::has_projected_shape;
use crate::model::block_type::{type_availability, BlockType, TypeAvailability};
use crate::model::day::DayDate;
use crate::model::section::SectionId;
use crate::repo::block_repo::BlockRepository;
use crate::repo::document_store::DocumentStore;
use crate::service::block_types::BlockTypeRegistry;
use crate::service::collaborators::PillarValidator;
use crate::service::payload::{deep_merge, empty_shape};
use crate::service::requests::{BlockPatch, MoveRequest, NewBlock, RequestContext};
use log::info;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Persisted blocks of one store.
pub struct NativeBlockStore<'s, S: DocumentStore + ?Sized> {
    blocks: BlockRepository<'s, S>,
    registry: BlockTypeRegistry<'s, S>,
    pillars: &'s dyn PillarValidator,
}

impl<'s, S: DocumentStore + ?Sized> NativeBlockStore<'s, S> {
    pub fn new(store: &'s S, pillars: &'s dyn PillarValidator) -> Self {
        Self {
            blocks: BlockRepository::new(store),
            registry: BlockTypeRegistry::new(store),
            pillars,
        }
    }

    pub fn registry(&self) -> &BlockTypeRegistry<'s, S> {
        &self.registry
    }

    /// Creates a native block for `date`.
    pub fn create(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        request: NewBlock,
    ) -> DayPlanResult<Block> {
        let type_id = request.type_id.trim().to_string();
        ensure_writable_type(&type_id)?;

        let id = match request.id.as_deref().map(str::trim) {
            Some(raw) if has_projected_shape(raw) => {
                return Err(DayPlanError::validation(format!(
                    "block id `{raw}` uses a reserved projected prefix"
                )));
            }
            Some(raw) if !raw.is_empty() => raw.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let block_type = self.require_type(&ctx.user_id, &type_id)?;
        let section_id = match request.section_id.as_deref() {
            Some(raw) => parse_section(raw)?,
            None => block_type.default_section,
        };
        if let Some(order) = request.order {
            check_order(order)?;
        }
        let data = self
            .registry
            .validate_data(&block_type, &request.data.unwrap_or_default())?;
        let pillar_id = resolve_pillar(self.pillars, &ctx.user_id, request.pillar_id.as_deref())?;
        let order = match request.order {
            Some(order) => order,
            None => self.next_order(&ctx.user_id, date, section_id)?,
        };

        let block = Block {
            id,
            user_id: ctx.user_id.clone(),
            date,
            type_id,
            section_id,
            order,
            is_expanded: request.is_expanded.unwrap_or(false),
            title: request.title.unwrap_or_else(|| block_type.name.clone()),
            subtitle: request.subtitle.unwrap_or_default(),
            icon: request.icon.unwrap_or_else(|| block_type.icon.clone()),
            pillar_id,
            source: request.source.unwrap_or_default(),
            data,
            created_at: ctx.now_ms,
            updated_at: ctx.now_ms,
        };
        self.blocks.insert(&block)?;
        info!(
            "event=block_create module=service status=ok date={date} type_id={} block_id={}",
            block.type_id, block.id
        );
        Ok(block)
    }

    /// Loads a block owned by `user_id` on `date`.
    pub fn get_by_id(&self, user_id: &str, date: DayDate, id: &str) -> DayPlanResult<Block> {
        self.blocks
            .get(id)?
            .filter(|block| {
                block.user_id == user_id
                    && block.date == date
                    && type_availability(&block.type_id) == TypeAvailability::Writable
            })
            .ok_or_else(|| DayPlanError::not_found(format!("block `{id}` not found on {date}")))
    }

    /// Applies a partial update; `data` is deep-merged then revalidated.
    pub fn patch(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        id: &str,
        patch: BlockPatch,
    ) -> DayPlanResult<Block> {
        let mut block = self.get_by_id(&ctx.user_id, date, id)?;
        self.apply_patch(ctx, &mut block, patch)?;
        self.blocks.replace(&block)?;
        info!("event=block_patch module=service status=ok date={date} block_id={id}");
        Ok(block)
    }

    /// Applies `patch` to an already loaded block without persisting it.
    pub(crate) fn apply_patch(
        &self,
        ctx: &RequestContext,
        block: &mut Block,
        patch: BlockPatch,
    ) -> DayPlanResult<()> {
        if let Some(raw) = patch.section_id.as_deref() {
            block.section_id = parse_section(raw)?;
        }
        if let Some(order) = patch.order {
            check_order(order)?;
            block.order = order;
        }
        if let Some(data) = patch.data.as_ref() {
            let block_type = self.require_type(&ctx.user_id, &block.type_id)?;
            let mut merged = block.data.clone();
            deep_merge(&mut merged, data);
            block.data = self.registry.validate_data(&block_type, &merged)?;
        }
        if let Some(pillar) = patch.pillar_id {
            block.pillar_id = resolve_pillar(self.pillars, &ctx.user_id, pillar.as_deref())?;
        }
        if let Some(title) = patch.title {
            block.title = title;
        }
        if let Some(subtitle) = patch.subtitle {
            block.subtitle = subtitle;
        }
        if let Some(icon) = patch.icon {
            block.icon = icon;
        }
        if let Some(is_expanded) = patch.is_expanded {
            block.is_expanded = is_expanded;
        }
        block.updated_at = ctx.now_ms;
        Ok(())
    }

    /// Moves a block to another section and order. Payload is untouched.
    pub fn move_block(
        &self,
        ctx: &RequestContext,
        date: DayDate,
        id: &str,
        request: &MoveRequest,
    ) -> DayPlanResult<Block> {
        let section_id = parse_section(&request.section_id)?;
        check_order(request.order)?;
        let mut block = self.get_by_id(&ctx.user_id, date, id)?;
        block.section_id = section_id;
        block.order = request.order;
        block.updated_at = ctx.now_ms;
        self.blocks.replace(&block)?;
        info!(
            "event=block_move module=service status=ok date={date} block_id={id} section={section_id}"
        );
        Ok(block)
    }

    /// Hard-deletes a block and returns what was removed.
    pub fn delete(&self, user_id: &str, date: DayDate, id: &str) -> DayPlanResult<Block> {
        let block = self.get_by_id(user_id, date, id)?;
        if !self.blocks.delete(&block.id)? {
            return Err(DayPlanError::not_found(format!("block `{id}` not found on {date}")));
        }
        info!("event=block_delete module=service status=ok date={date} block_id={id}");
        Ok(block)
    }

    /// Stored blocks of `user_id` for `date`, excluding reserved and disabled
    /// types.
    pub fn list_for_date(&self, user_id: &str, date: DayDate) -> DayPlanResult<Vec<Block>> {
        let mut blocks = self.blocks.list_for_date(user_id, date)?;
        blocks.retain(|block| type_availability(&block.type_id) == TypeAvailability::Writable);
        Ok(blocks)
    }

    /// Stored blocks of one type for `date`.
    pub fn list_of_type(
        &self,
        user_id: &str,
        date: DayDate,
        type_id: &str,
    ) -> DayPlanResult<Vec<Block>> {
        let mut blocks = self.list_for_date(user_id, date)?;
        blocks.retain(|block| block.type_id == type_id);
        Ok(blocks)
    }

    /// One past the highest native order in `section_id`, or 0 when empty.
    pub fn next_order(
        &self,
        user_id: &str,
        date: DayDate,
        section_id: SectionId,
    ) -> DayPlanResult<i64> {
        Ok(self
            .list_for_date(user_id, date)?
            .iter()
            .filter(|block| block.section_id == section_id)
            .map(|block| block.order)
            .max()
            .map_or(0, |max| max.saturating_add(1)))
    }

    fn require_type(&self, user_id: &str, type_id: &str) -> DayPlanResult<BlockType> {
        self.registry
            .resolve(user_id, type_id)?
            .ok_or_else(|| DayPlanError::validation(format!("unknown block type `{type_id}`")))
    }
}

/// Rejects type ids that can never back a native block.
pub(crate) fn ensure_writable_type(type_id: &str) -> DayPlanResult<()> {
    match type_availability(type_id) {
        TypeAvailability::Writable => Ok(()),
        TypeAvailability::Reserved => Err(DayPlanError::validation(format!(
            "block type `{type_id}` is projected from tasks or habits and cannot be stored"
        ))),
        TypeAvailability::Disabled => Err(DayPlanError::Unsupported(format!(
            "block type `{type_id}` is no longer supported"
        ))),
    }
}

pub(crate) fn parse_section(raw: &str) -> DayPlanResult<SectionId> {
    SectionId::parse(raw)
        .ok_or_else(|| DayPlanError::validation(format!("unknown sectionId `{}`", raw.trim())))
}

pub(crate) fn check_order(order: i64) -> DayPlanResult<()> {
    if order < 0 {
        return Err(DayPlanError::validation("order must be zero or greater"));
    }
    Ok(())
}

/// Normalizes a pillar reference: blank means none, anything else must exist.
pub(crate) fn resolve_pillar(
    pillars: &dyn PillarValidator,
    user_id: &str,
    raw: Option<&str>,
) -> DayPlanResult<Option<String>> {
    let Some(pillar_id) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if !pillars.pillar_exists(user_id, pillar_id)? {
        return Err(DayPlanError::validation(format!(
            "pillar `{pillar_id}` does not exist"
        )));
    }
    Ok(Some(pillar_id.to_string()))
}

/// Payload of a by-type create: empty shape overlaid with the caller's data.
pub(crate) fn seeded_payload(
    block_type: &BlockType,
    data: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut payload = empty_shape(&block_type.data_schema);
    if let Some(data) = data {
        deep_merge(&mut payload, data);
    }
    payload
}
