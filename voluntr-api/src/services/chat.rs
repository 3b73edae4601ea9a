use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use voluntr_shared::clients::push::PushMessage;
use voluntr_shared::errors::{AppError, AppResult, ErrorCode};
use voluntr_shared::types::auth::{AuthUser, UserRole};

use crate::models::{ChatMessage, ChatThread, NewChatMessage, NewChatThread};
use crate::schema::{chat_messages, chat_threads, events, users};
use crate::services::events::load_event;

pub const MESSAGE_MAX_CHARS: usize = 1000;

pub fn thread_room(thread_id: Uuid) -> String {
    format!("thread:{thread_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCheck {
    Empty,
    TooLong,
}

/// Trims and length-checks a raw message. Length is counted in characters.
pub fn prepare_message(raw: &str) -> Result<String, MessageCheck> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(MessageCheck::Empty);
    }
    if text.chars().count() > MESSAGE_MAX_CHARS {
        return Err(MessageCheck::TooLong);
    }
    Ok(text.to_string())
}

impl From<MessageCheck> for AppError {
    fn from(check: MessageCheck) -> Self {
        match check {
            MessageCheck::Empty => AppError::new(ErrorCode::MessageEmpty, "Message is required"),
            MessageCheck::TooLong => AppError::new(
                ErrorCode::MessageTooLong,
                format!("Message must be at most {MESSAGE_MAX_CHARS} characters"),
            ),
        }
    }
}

fn thread_not_found() -> AppError {
    AppError::new(ErrorCode::ThreadNotFound, "Thread not found")
}

/// A thread the user belongs to. Non-members get the same answer as a missing thread.
pub fn thread_for_member(conn: &mut PgConnection, thread_id: Uuid, user_id: Uuid) -> AppResult<ChatThread> {
    chat_threads::table
        .find(thread_id)
        .filter(
            chat_threads::organiser_id
                .eq(user_id)
                .or(chat_threads::volunteer_id.eq(user_id)),
        )
        .first::<ChatThread>(conn)
        .optional()?
        .ok_or_else(thread_not_found)
}

#[derive(Debug)]
pub struct ThreadLookup {
    pub thread: ChatThread,
    pub created: bool,
}

pub fn get_or_create_thread(
    conn: &mut PgConnection,
    user: &AuthUser,
    event_id: Uuid,
    volunteer_id: Option<Uuid>,
) -> AppResult<ThreadLookup> {
    let (organiser_id, volunteer_id) = match user.role {
        UserRole::Organiser => {
            let volunteer_id = volunteer_id
                .ok_or_else(|| AppError::new(ErrorCode::ValidationError, "volunteerId is required"))?;
            let event = load_event(conn, event_id)?;
            if event.organiser_id != user.id {
                return Err(AppError::new(ErrorCode::NotEventOwner, "Not your event"));
            }
            (user.id, volunteer_id)
        }
        UserRole::Volunteer => {
            let event = load_event(conn, event_id)?;
            (event.organiser_id, user.id)
        }
        UserRole::Admin => {
            return Err(AppError::new(ErrorCode::RoleNotAllowed, "Role not allowed"));
        }
    };

    if organiser_id == volunteer_id {
        return Err(AppError::new(ErrorCode::BadRequest, "cannot open a thread with yourself"));
    }

    // Single statement against the unique triple; a concurrent creator makes this a no-op.
    let inserted = diesel::insert_into(chat_threads::table)
        .values(&NewChatThread { event_id, organiser_id, volunteer_id })
        .on_conflict((
            chat_threads::event_id,
            chat_threads::organiser_id,
            chat_threads::volunteer_id,
        ))
        .do_nothing()
        .get_result::<ChatThread>(conn)
        .optional()
        .map_err(|e| AppError::from_reference(e, ErrorCode::NotFound, "Volunteer not found"))?;

    if let Some(thread) = inserted {
        tracing::info!(thread_id = %thread.id, event_id = %event_id, organiser_id = %organiser_id, volunteer_id = %volunteer_id, "chat thread created");
        return Ok(ThreadLookup { thread, created: true });
    }

    let thread = chat_threads::table
        .filter(chat_threads::event_id.eq(event_id))
        .filter(chat_threads::organiser_id.eq(organiser_id))
        .filter(chat_threads::volunteer_id.eq(volunteer_id))
        .first::<ChatThread>(conn)?;

    Ok(ThreadLookup { thread, created: false })
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub id: Uuid,
    pub event_id: Uuid,
    pub organiser_id: Uuid,
    pub volunteer_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub event_title: String,
    pub organiser_name: Option<String>,
    pub volunteer_name: Option<String>,
    pub counterpart_name: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Most recent activity first; silent threads go last, newest thread first among equals.
pub fn thread_order(a: &ThreadSummary, b: &ThreadSummary) -> Ordering {
    match (a.last_message_at, b.last_message_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.created_at.cmp(&a.created_at))
}

pub fn list_threads(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<ThreadSummary>> {
    let rows: Vec<(ChatThread, String)> = chat_threads::table
        .inner_join(events::table)
        .filter(
            chat_threads::organiser_id
                .eq(user_id)
                .or(chat_threads::volunteer_id.eq(user_id)),
        )
        .select((chat_threads::all_columns, events::title))
        .load(conn)?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let thread_ids: Vec<Uuid> = rows.iter().map(|(t, _)| t.id).collect();
    let last_messages: HashMap<Uuid, (String, DateTime<Utc>)> = chat_messages::table
        .filter(chat_messages::thread_id.eq_any(thread_ids))
        .order((chat_messages::thread_id, chat_messages::created_at.desc()))
        .distinct_on(chat_messages::thread_id)
        .select((chat_messages::thread_id, chat_messages::message, chat_messages::created_at))
        .load::<(Uuid, String, DateTime<Utc>)>(conn)?
        .into_iter()
        .map(|(thread_id, message, at)| (thread_id, (message, at)))
        .collect();

    let user_ids: Vec<Uuid> = rows
        .iter()
        .flat_map(|(t, _)| [t.organiser_id, t.volunteer_id])
        .collect();
    let names: HashMap<Uuid, String> = users::table
        .filter(users::id.eq_any(user_ids))
        .select((users::id, users::name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    let mut threads: Vec<ThreadSummary> = rows
        .into_iter()
        .map(|(thread, event_title)| {
            let last = last_messages.get(&thread.id);
            let counterpart = thread.counterpart(user_id);
            ThreadSummary {
                id: thread.id,
                event_id: thread.event_id,
                organiser_id: thread.organiser_id,
                volunteer_id: thread.volunteer_id,
                created_at: thread.created_at,
                event_title,
                organiser_name: names.get(&thread.organiser_id).cloned(),
                volunteer_name: names.get(&thread.volunteer_id).cloned(),
                counterpart_name: counterpart.and_then(|id| names.get(&id).cloned()),
                last_message: last.map(|(m, _)| m.clone()),
                last_message_at: last.map(|(_, at)| *at),
            }
        })
        .collect();

    threads.sort_by(thread_order);
    Ok(threads)
}

#[derive(Debug, Serialize)]
pub struct ThreadHistory {
    pub thread: ChatThread,
    pub messages: Vec<ChatMessage>,
}

pub fn get_messages(conn: &mut PgConnection, thread_id: Uuid, user_id: Uuid) -> AppResult<ThreadHistory> {
    let thread = thread_for_member(conn, thread_id, user_id)?;
    let messages = chat_messages::table
        .filter(chat_messages::thread_id.eq(thread_id))
        .order((chat_messages::created_at.asc(), chat_messages::id.asc()))
        .load::<ChatMessage>(conn)?;
    Ok(ThreadHistory { thread, messages })
}

#[derive(Debug)]
pub struct SentMessage {
    pub message: ChatMessage,
    pub recipient_id: Uuid,
}

impl SentMessage {
    pub fn push_message(&self) -> PushMessage {
        PushMessage::new("New message", self.message.message.clone())
            .with_data("type", "chat_message")
            .with_data("threadId", self.message.thread_id)
    }
}

/// Persists an already-prepared message from a thread member.
pub fn store_message(conn: &mut PgConnection, thread_id: Uuid, sender_id: Uuid, text: String) -> AppResult<SentMessage> {
    let thread = thread_for_member(conn, thread_id, sender_id)?;
    let recipient_id = thread.counterpart(sender_id).ok_or_else(thread_not_found)?;

    let message: ChatMessage = diesel::insert_into(chat_messages::table)
        .values(&NewChatMessage { thread_id, sender_id, message: text })
        .get_result(conn)?;

    tracing::debug!(thread_id = %thread_id, sender_id = %sender_id, message_id = %message.id, "chat message stored");
    Ok(SentMessage { message, recipient_id })
}

pub fn send_message(conn: &mut PgConnection, thread_id: Uuid, sender_id: Uuid, raw: &str) -> AppResult<SentMessage> {
    let text = prepare_message(raw)?;
    store_message(conn, thread_id, sender_id, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn message_is_trimmed() {
        assert_eq!(prepare_message("  hello \n").unwrap(), "hello");
    }

    #[test]
    fn blank_message_rejected() {
        assert_eq!(prepare_message("   "), Err(MessageCheck::Empty));
        assert_eq!(prepare_message(""), Err(MessageCheck::Empty));
    }

    #[test]
    fn length_limit_counts_characters() {
        let at_limit = "é".repeat(MESSAGE_MAX_CHARS);
        assert!(prepare_message(&at_limit).is_ok());

        let over = "a".repeat(MESSAGE_MAX_CHARS + 1);
        assert_eq!(prepare_message(&over), Err(MessageCheck::TooLong));

        let padded = format!("   {}   ", "a".repeat(MESSAGE_MAX_CHARS));
        assert!(prepare_message(&padded).is_ok());
    }

    #[test]
    fn message_errors_map_to_bad_request() {
        let err: AppError = MessageCheck::TooLong.into();
        assert_eq!(err.code(), ErrorCode::MessageTooLong);
        let err: AppError = MessageCheck::Empty.into();
        assert_eq!(err.code(), ErrorCode::MessageEmpty);
    }

    fn summary(created_at: DateTime<Utc>, last: Option<DateTime<Utc>>) -> ThreadSummary {
        ThreadSummary {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            organiser_id: Uuid::new_v4(),
            volunteer_id: Uuid::new_v4(),
            created_at,
            event_title: "Soup kitchen".into(),
            organiser_name: None,
            volunteer_name: None,
            counterpart_name: None,
            last_message: last.map(|_| "hi".to_string()),
            last_message_at: last,
        }
    }

    #[test]
    fn threads_sorted_by_activity_then_creation() {
        let t0 = Utc::now();
        let recent = summary(t0, Some(t0 + Duration::minutes(30)));
        let older = summary(t0 + Duration::minutes(5), Some(t0 + Duration::minutes(10)));
        let silent_new = summary(t0 + Duration::minutes(20), None);
        let silent_old = summary(t0 + Duration::minutes(1), None);

        let mut threads = vec![silent_old.clone(), older.clone(), silent_new.clone(), recent.clone()];
        threads.sort_by(thread_order);

        let ids: Vec<Uuid> = threads.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![recent.id, older.id, silent_new.id, silent_old.id]);
    }

    #[test]
    fn chat_push_payload() {
        let thread_id = Uuid::new_v4();
        let sent = SentMessage {
            message: ChatMessage {
                id: Uuid::new_v4(),
                thread_id,
                sender_id: Uuid::new_v4(),
                message: "hello".into(),
                created_at: Utc::now(),
            },
            recipient_id: Uuid::new_v4(),
        };
        let push = sent.push_message();
        assert_eq!(push.title, "New message");
        assert_eq!(push.body, "hello");
        assert_eq!(push.data["type"], "chat_message");
        assert_eq!(push.data["threadId"], thread_id.to_string());
    }

    #[test]
    fn room_name() {
        let id = Uuid::nil();
        assert_eq!(thread_room(id), "thread:00000000-0000-0000-0000-000000000000");
    }
}
