use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::errors::{ApiJson, ApiPath, ApiQuery, AppError};
use crate::models::application::{
    Application, ApplicationPatch, ApplicationQuery, ApplicationStats, CreateApplicationRequest,
    Documents, DocumentsPatch,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handle_list_applications).post(handle_create_application),
        )
        .route("/stats/summary", get(handle_application_stats))
        .route(
            "/:id",
            get(handle_get_application)
                .put(handle_update_application)
                .delete(handle_delete_application),
        )
        .route("/:id/documents", put(handle_update_documents))
}

fn not_found() -> AppError {
    AppError::NotFound("Application not found".to_string())
}

/// GET /api/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ApplicationQuery>,
) -> Result<Json<Vec<Application>>, AppError> {
    let filter = query.into_filter()?;
    Ok(Json(state.store.list_applications(&filter).await?))
}

/// GET /api/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Application>, AppError> {
    state
        .store
        .get_application(id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// POST /api/applications
pub async fn handle_create_application(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    let new = req.validate()?;
    let application = state.store.create_application(&new).await?;
    tracing::info!(id = application.id, "Application created");
    Ok((StatusCode::CREATED, Json(application)))
}

/// PUT /api/applications/:id
pub async fn handle_update_application(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(patch): ApiJson<ApplicationPatch>,
) -> Result<Json<Application>, AppError> {
    state
        .store
        .update_application(id, &patch)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// DELETE /api/applications/:id
pub async fn handle_delete_application(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_application(id).await? {
        return Err(not_found());
    }
    Ok(Json(json!({ "message": "Application deleted successfully" })))
}

/// PUT /api/applications/:id/documents
pub async fn handle_update_documents(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(patch): ApiJson<DocumentsPatch>,
) -> Result<Json<Documents>, AppError> {
    state
        .store
        .update_documents(id, &patch)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Documents not found for this application".to_string()))
}

/// GET /api/applications/stats/summary
pub async fn handle_application_stats(
    State(state): State<AppState>,
) -> Result<Json<ApplicationStats>, AppError> {
    Ok(Json(state.store.application_stats().await?))
}
