use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};

use crate::db::chat_db;
use crate::state::AppState;

/// Oldest-first history for a room, matched across every room-id convention.
/// An unknown room is an empty list, not an error.
async fn chat_history(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    match chat_db::chat_history(&state.db, &room_id, None).await {
        Ok(messages) => {
            let data: Vec<_> = messages.iter().map(|m| m.to_payload()).collect();
            Json(serde_json::json!({ "success": true, "data": data })).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to load chat history for '{}': {}", room_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": "Failed to load chat history"
                })),
            )
                .into_response()
        }
    }
}

async fn mark_read(
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> impl IntoResponse {
    match chat_db::mark_messages_read(&state.db, student_id).await {
        Ok(_) => Json(serde_json::json!({
            "success": true,
            "message": "Messages marked as read"
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to mark messages read for {}: {}", student_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat-history/{room_id}", get(chat_history))
        .route("/api/chat/chat-history/{room_id}", get(chat_history))
        .route("/mark-read/{student_id}", put(mark_read))
        .route("/api/chat/mark-read/{student_id}", put(mark_read))
}
