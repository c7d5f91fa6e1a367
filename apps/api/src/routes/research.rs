use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::assistant::autofill::suggest_research_details;
use crate::errors::{ApiJson, ApiPath, ApiQuery, AppError};
use crate::models::research::{
    AutofillRequest, CreateResearchRequest, ResearchItem, ResearchPatch, ResearchQuery,
    ResearchStats, ResearchSuggestion, StatusUpdate,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_list_research).post(handle_create_research))
        .route("/stats", get(handle_research_stats))
        .route("/autofill", post(handle_autofill))
        .route(
            "/:id",
            put(handle_update_research).delete(handle_delete_research),
        )
        .route("/:id/status", patch(handle_update_research_status))
}

fn not_found() -> AppError {
    AppError::NotFound("Item not found".to_string())
}

/// GET /api/research
pub async fn handle_list_research(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ResearchQuery>,
) -> Result<Json<Vec<ResearchItem>>, AppError> {
    let filter = query.into_filter()?;
    Ok(Json(state.store.list_research(&filter).await?))
}

/// GET /api/research/stats
pub async fn handle_research_stats(
    State(state): State<AppState>,
) -> Result<Json<ResearchStats>, AppError> {
    Ok(Json(state.store.research_stats().await?))
}

/// POST /api/research
pub async fn handle_create_research(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateResearchRequest>,
) -> Result<(StatusCode, Json<ResearchItem>), AppError> {
    let new = req.validate()?;
    Ok((
        StatusCode::CREATED,
        Json(state.store.create_research(&new).await?),
    ))
}

/// PUT /api/research/:id
pub async fn handle_update_research(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(patch): ApiJson<ResearchPatch>,
) -> Result<Json<ResearchItem>, AppError> {
    if patch.is_empty() {
        return Err(AppError::Validation("No updates provided".to_string()));
    }
    state
        .store
        .update_research(id, &patch)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// PATCH /api/research/:id/status
pub async fn handle_update_research_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<ResearchItem>, AppError> {
    let status = update.validate()?;
    state
        .store
        .set_research_status(id, status)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// DELETE /api/research/:id
pub async fn handle_delete_research(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, AppError> {
    let deleted = state
        .store
        .delete_research(id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

/// POST /api/research/autofill
pub async fn handle_autofill(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AutofillRequest>,
) -> Result<Json<ResearchSuggestion>, AppError> {
    Ok(Json(
        suggest_research_details(state.model.as_ref(), req).await?,
    ))
}
