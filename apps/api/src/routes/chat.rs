use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::assistant::Conversation;
use crate::errors::{ApiJson, ApiQuery, AppError};
use crate::models::chat::{
    ChatMessage, ChatReply, ChatRequest, ChatRole, ChatTurn, ClearHistoryQuery, HistoryQuery,
};
use crate::models::non_blank;
use crate::state::AppState;

const DEFAULT_SESSION: &str = "default";
const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handle_chat))
        .route(
            "/history",
            get(handle_chat_history).delete(handle_clear_chat_history),
        )
}

/// POST /api/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let message = non_blank(req.message)
        .ok_or_else(|| AppError::Validation("Message is required".to_string()))?;
    let session_id = non_blank(req.session_id).unwrap_or_else(|| DEFAULT_SESSION.to_string());

    let mut history = state.sessions.load(&session_id).await?;
    let reply = Conversation::new(
        state.model.as_ref(),
        state.store.as_ref(),
        state.config.chat_max_tool_rounds,
    )
    .respond(&history, &message)
    .await?;

    if reply.truncated {
        warn!(%session_id, "Chat reply truncated at the tool round limit");
    }
    info!(%session_id, tool_calls = reply.tool_calls, "Chat reply generated");

    history.push(ChatTurn::user(message.clone()));
    history.push(ChatTurn::assistant(reply.message.clone()));
    state.sessions.save(&session_id, history).await?;

    state
        .store
        .append_chat_message(ChatRole::User, &message)
        .await?;
    state
        .store
        .append_chat_message(ChatRole::Assistant, &reply.message)
        .await?;

    Ok(Json(ChatReply {
        message: reply.message,
        session_id,
    }))
}

/// GET /api/chat/history
pub async fn handle_chat_history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    Ok(Json(state.store.recent_chat_messages(limit).await?))
}

/// DELETE /api/chat/history
pub async fn handle_clear_chat_history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ClearHistoryQuery>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.store.clear_chat_messages().await?;
    match non_blank(query.session_id) {
        Some(session_id) => state.sessions.remove(&session_id).await?,
        None => state.sessions.clear().await?,
    }
    info!(deleted, "Chat history cleared");
    Ok(Json(json!({ "message": "Chat history cleared" })))
}
