//! Route table and handlers.
//!
//! Every handler parses path segments and bodies into core request types,
//! then hands a closure to [`AppState::with_service`].

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{async_trait, Json, Router};
use dayplan_core::{
    core_version, BlockFilter, BlockPatch, BlockTypeDraft, BlockTypeRegistry, DayDate,
    DayPlanError, MoveRequest, NewBlock, RequestContext,
};
use serde::Deserialize;
use serde_json::{json, Value};

pub const USER_HEADER: &str = "x-user-id";

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/block-types", get(list_block_types).post(create_block_type))
        .route("/days/:date/blocks", get(list_blocks).post(create_block))
        .route("/days/:date/blocks/by-type/:type_id", patch(upsert_by_type))
        .route(
            "/days/:date/blocks/:block_id",
            get(get_block).patch(patch_block).delete(delete_block),
        )
        .route("/days/:date/blocks/:block_id/move", patch(move_block))
        .with_state(state)
}

/// Authenticated caller, taken from the upstream auth layer's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| UserId(value.to_string()))
            .ok_or_else(|| ApiError::unauthorized(format!("missing {USER_HEADER} header")))
    }
}

impl UserId {
    fn context(self) -> RequestContext {
        RequestContext::at_now(self.0)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    section_id: Option<String>,
    type_id: Option<String>,
    resolve: Option<String>,
}

fn parse_date(raw: &str) -> Result<DayDate, ApiError> {
    DayDate::parse(raw).map_err(|err| DayPlanError::from(err).into())
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(value)| value).map_err(ApiError::from)
}

fn is_truthy(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|value| value.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "version": core_version()}))
}

async fn list_block_types(
    user: UserId,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let types = state
        .with_store(move |store| Ok(BlockTypeRegistry::new(store).list(&user.0)?))
        .await?;
    Ok(Json(types).into_response())
}

async fn create_block_type(
    user: UserId,
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let draft = BlockTypeDraft::from_json(json_body(body)?)?;
    let created = state
        .with_store(move |store| BlockTypeRegistry::new(store).create_custom(&user.0, draft))
        .await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn list_blocks(
    user: UserId,
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let date = parse_date(&date)?;
    let filter = BlockFilter::from_params(params.section_id.as_deref(), params.type_id.as_deref())?;
    let resolve = is_truthy(params.resolve.as_deref());
    let blocks = state
        .with_service(move |service| service.list_resolved(&user.0, date, &filter, resolve))
        .await?;
    Ok(Json(blocks).into_response())
}

async fn create_block(
    user: UserId,
    State(state): State<AppState>,
    Path(date): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let date = parse_date(&date)?;
    let request = NewBlock::from_json(json_body(body)?)?;
    let ctx = user.context();
    let block = state
        .with_service(move |service| service.create_block(&ctx, date, request))
        .await?;
    Ok((StatusCode::CREATED, Json(block)).into_response())
}

async fn upsert_by_type(
    user: UserId,
    State(state): State<AppState>,
    Path((date, type_id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let date = parse_date(&date)?;
    let patch = BlockPatch::from_json(json_body(body)?)?;
    let ctx = user.context();
    let outcome = state
        .with_service(move |service| service.upsert_by_type(&ctx, date, &type_id, patch))
        .await?;
    let status = if outcome.was_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.into_block())).into_response())
}

async fn get_block(
    user: UserId,
    State(state): State<AppState>,
    Path((date, block_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let date = parse_date(&date)?;
    let block = state
        .with_service(move |service| service.get_block(&user.0, date, &block_id))
        .await?;
    Ok(Json(block).into_response())
}

async fn patch_block(
    user: UserId,
    State(state): State<AppState>,
    Path((date, block_id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let date = parse_date(&date)?;
    let patch = BlockPatch::from_json(json_body(body)?)?;
    let ctx = user.context();
    let block = state
        .with_service(move |service| service.patch_block(&ctx, date, &block_id, patch))
        .await?;
    Ok(Json(block).into_response())
}

async fn move_block(
    user: UserId,
    State(state): State<AppState>,
    Path((date, block_id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let date = parse_date(&date)?;
    let request = MoveRequest::from_json(json_body(body)?)?;
    let ctx = user.context();
    let block = state
        .with_service(move |service| service.move_block(&ctx, date, &block_id, &request))
        .await?;
    Ok(Json(block).into_response())
}

async fn delete_block(
    user: UserId,
    State(state): State<AppState>,
    Path((date, block_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let date = parse_date(&date)?;
    let ctx = user.context();
    let deleted = state
        .with_service(move |service| service.delete_block(&ctx, date, &block_id))
        .await?;
    Ok(Json(deleted).into_response())
}
