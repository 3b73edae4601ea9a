use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use voluntr_shared::clients::db::checkout;
use voluntr_shared::errors::AppResult;
use voluntr_shared::types::api::ApiResponse;
use voluntr_shared::middleware::{JsonBody, PathParam, CHAT_MESSAGES_SENT};
use voluntr_shared::types::auth::AuthUser;

use crate::models::{ChatMessage, ChatThread};
use crate::services::chat::{self, ThreadHistory, ThreadSummary};
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRequest {
    #[serde(alias = "event_id")]
    pub event_id: Uuid,
    #[serde(default, alias = "volunteer_id")]
    pub volunteer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
}

// --- Handlers ---

/// POST /chat/thread - 201 when created, 200 when it already existed
pub async fn get_or_create_thread(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<ThreadRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ChatThread>>)> {
    let mut conn = checkout(&state.db)?;
    let lookup = chat::get_or_create_thread(&mut conn, &auth_user, body.event_id, body.volunteer_id)?;
    let status = if lookup.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(ApiResponse::ok(lookup.thread))))
}

/// GET /chat/threads
pub async fn list_threads(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<ThreadSummary>>>> {
    let mut conn = checkout(&state.db)?;
    Ok(Json(ApiResponse::ok(chat::list_threads(&mut conn, auth_user.id)?)))
}

/// GET /chat/thread/:thread_id/messages
pub async fn get_messages(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(thread_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<ThreadHistory>>> {
    let mut conn = checkout(&state.db)?;
    Ok(Json(ApiResponse::ok(chat::get_messages(&mut conn, thread_id, auth_user.id)?)))
}

/// POST /chat/thread/:thread_id/messages - HTTP fallback for the socket send path
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(thread_id): PathParam<Uuid>,
    JsonBody(body): JsonBody<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ChatMessage>>)> {
    let sent = {
        let mut conn = checkout(&state.db)?;
        chat::send_message(&mut conn, thread_id, auth_user.id, &body.message)?
    };

    metrics::counter!(CHAT_MESSAGES_SENT, "channel" => "http").increment(1);

    let room = chat::thread_room(thread_id);
    let result = state.io.to(room.clone()).emit("newMessage", &sent.message);
    tracing::debug!(room = %room, success = result.is_ok(), "broadcast newMessage (http)");

    state
        .notifier
        .spawn_notify(vec![sent.recipient_id], sent.push_message());

    Ok(ApiResponse::created(sent.message))
}
