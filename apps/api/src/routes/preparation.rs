use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::errors::{ApiJson, ApiPath, ApiQuery, AppError};
use crate::models::application::parse_optional;
use crate::models::preparation::{
    CreatePreparationRequest, PreparationItem, PreparationPatch, PreparationQuery,
    PreparationStats,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handle_list_preparation).post(handle_create_preparation),
        )
        .route("/stats", get(handle_preparation_stats))
        .route(
            "/:id",
            put(handle_update_preparation).delete(handle_delete_preparation),
        )
        .route("/:id/toggle", patch(handle_toggle_preparation))
}

fn not_found() -> AppError {
    AppError::NotFound("Item not found".to_string())
}

/// GET /api/preparation
pub async fn handle_list_preparation(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PreparationQuery>,
) -> Result<Json<Vec<PreparationItem>>, AppError> {
    let kind = parse_optional(query.kind)?;
    Ok(Json(state.store.list_preparation(kind).await?))
}

/// GET /api/preparation/stats
pub async fn handle_preparation_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<PreparationStats>>, AppError> {
    Ok(Json(state.store.preparation_stats().await?))
}

/// POST /api/preparation
pub async fn handle_create_preparation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreatePreparationRequest>,
) -> Result<(StatusCode, Json<PreparationItem>), AppError> {
    let new = req.validate()?;
    Ok((
        StatusCode::CREATED,
        Json(state.store.create_preparation(&new).await?),
    ))
}

/// PUT /api/preparation/:id
pub async fn handle_update_preparation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(patch): ApiJson<PreparationPatch>,
) -> Result<Json<PreparationItem>, AppError> {
    if patch.is_empty() {
        return Err(AppError::Validation("No updates provided".to_string()));
    }
    state
        .store
        .update_preparation(id, &patch)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// PATCH /api/preparation/:id/toggle
pub async fn handle_toggle_preparation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<PreparationItem>, AppError> {
    state
        .store
        .toggle_preparation(id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// DELETE /api/preparation/:id
pub async fn handle_delete_preparation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, AppError> {
    let deleted = state
        .store
        .delete_preparation(id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
