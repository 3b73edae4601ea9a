use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use socketioxide::extract::{AckSender, Data, SocketRef};
use uuid::Uuid;

use voluntr_shared::clients::db::checkout;
use voluntr_shared::errors::{AppError, ErrorCode};
use voluntr_shared::middleware::{decode_claims, CHAT_MESSAGES_SENT, CHAT_RATE_LIMITED};

use crate::services::chat::{self, MessageCheck};
use crate::socket::{handshake_token, SocketSession};
use crate::AppState;

pub const TOO_LONG: &str = "Message too long. Please shorten it.";
pub const TOO_MANY: &str = "Too many messages. Please slow down.";

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorPayload {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code().code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RateLimitedPayload {
    pub message: &'static str,
}

/// Reply to a `joinThread` that asked for an acknowledgement. Refusals look the same
/// for missing threads and non-members.
#[derive(Debug, Serialize)]
pub struct JoinAck {
    pub joined: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinThread {
    thread_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessage {
    thread_id: Uuid,
    #[serde(default)]
    message: serde_json::Value,
}

/// What the send path does with raw input before touching the limiter or the database.
#[derive(Debug, PartialEq, Eq)]
pub enum Screened {
    Drop,
    Reject(&'static str),
    Accept(String),
}

/// Non-string scalars are stringified. Blank input is dropped without a reply.
pub fn screen_message(raw: &serde_json::Value) -> Screened {
    let text = match raw {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return Screened::Drop,
    };
    match chat::prepare_message(&text) {
        Ok(text) => Screened::Accept(text),
        Err(MessageCheck::Empty) => Screened::Drop,
        Err(MessageCheck::TooLong) => Screened::Reject(TOO_LONG),
    }
}

fn stored_session(socket: &SocketRef) -> Option<SocketSession> {
    socket.extensions.get::<SocketSession>()
}

/// Session of a socket whose token is still valid. Expired sockets are disconnected.
fn live_session(socket: &SocketRef) -> Option<SocketSession> {
    let session = stored_session(socket)?;
    if session.is_expired_at(Utc::now().timestamp()) {
        tracing::info!(user_id = %session.user_id, sid = %socket.id, "socket token expired, disconnecting");
        let err = AppError::new(ErrorCode::TokenExpired, "token has expired");
        let _ = socket.emit("error", &ErrorPayload::from(&err));
        socket.clone().disconnect().ok();
        return None;
    }
    Some(session)
}

pub async fn on_connect(socket: SocketRef, auth: Option<serde_json::Value>, state: Arc<AppState>) {
    let token = handshake_token(auth.as_ref(), socket.req_parts().uri.query());

    let claims = match token {
        Some(token) => decode_claims(&token, &state.config.jwt_secret),
        None => Err(AppError::unauthorized("no token provided")),
    };

    let session = match claims {
        Ok(claims) => SocketSession::from(claims),
        Err(err) => {
            tracing::warn!(error = %err, sid = %socket.id, "chat socket auth failed");
            let _ = socket.emit("error", &ErrorPayload::from(&err));
            socket.disconnect().ok();
            return;
        }
    };

    tracing::info!(user_id = %session.user_id, role = %session.role, sid = %socket.id, "chat socket connected");
    socket.extensions.insert(session);

    socket.on("joinThread", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload), ack: AckSender| {
            let state = state.clone();
            async move {
                let joined = on_join_thread(socket, payload, &state).await;
                ack.send(&JoinAck { joined }).ok();
            }
        }
    });

    socket.on("sendMessage", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_send_message(socket, payload, &state).await; }
        }
    });

    socket.on_disconnect(|socket: SocketRef| async move {
        if let Some(session) = stored_session(&socket) {
            tracing::info!(user_id = %session.user_id, sid = %socket.id, "chat socket disconnected");
        }
    });
}

/// Returns whether the socket is now in the thread room.
async fn on_join_thread(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) -> bool {
    let Some(session) = live_session(&socket) else { return false };

    let request: JoinThread = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, user_id = %session.user_id, "joinThread payload rejected");
            return false;
        }
    };

    let membership = checkout(&state.db)
        .and_then(|mut conn| chat::thread_for_member(&mut conn, request.thread_id, session.user_id));

    match membership {
        Ok(thread) => {
            socket.join(chat::thread_room(thread.id)).ok();
            tracing::debug!(user_id = %session.user_id, thread_id = %thread.id, "joined thread room");
            true
        }
        Err(err) if err.code() == ErrorCode::ThreadNotFound => {
            tracing::debug!(user_id = %session.user_id, thread_id = %request.thread_id, "join refused for non-member");
            false
        }
        Err(err) => {
            tracing::error!(error = %err, thread_id = %request.thread_id, "joinThread failed");
            false
        }
    }
}

async fn on_send_message(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let Some(session) = live_session(&socket) else { return };

    let request: SendMessage = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, user_id = %session.user_id, "sendMessage payload rejected");
            return;
        }
    };

    let text = match screen_message(&request.message) {
        Screened::Accept(text) => text,
        Screened::Drop => return,
        Screened::Reject(reason) => {
            let _ = socket.emit("rateLimited", &RateLimitedPayload { message: reason });
            return;
        }
    };

    if !state.rate_limiter.try_consume(session.user_id).await {
        metrics::counter!(CHAT_RATE_LIMITED).increment(1);
        tracing::debug!(user_id = %session.user_id, "chat message rate limited");
        let _ = socket.emit("rateLimited", &RateLimitedPayload { message: TOO_MANY });
        return;
    }

    let stored = checkout(&state.db)
        .and_then(|mut conn| chat::store_message(&mut conn, request.thread_id, session.user_id, text));

    let sent = match stored {
        Ok(sent) => sent,
        Err(err) if err.code() == ErrorCode::ThreadNotFound => {
            tracing::debug!(user_id = %session.user_id, thread_id = %request.thread_id, "message from non-member dropped");
            return;
        }
        Err(err) => {
            tracing::error!(error = %err, thread_id = %request.thread_id, "sendMessage failed");
            return;
        }
    };

    metrics::counter!(CHAT_MESSAGES_SENT, "channel" => "socket").increment(1);

    let room = chat::thread_room(request.thread_id);
    let result = state.io.to(room.clone()).emit("newMessage", &sent.message);
    tracing::debug!(room = %room, success = result.is_ok(), "broadcast newMessage (socket)");

    state
        .notifier
        .spawn_notify(vec![sent.recipient_id], sent.push_message());
}
