use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{
    applications, categories, chat_messages, chat_threads, device_tokens, event_categories, events,
    ratings, users, verification_requests,
};

// --- User (read-only) ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

// --- Event ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = events)]
pub struct Event {
    pub id: Uuid,
    pub organiser_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub event_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub event_type: String,
    pub payment_per_day: Option<i32>,
    pub volunteers_required: i32,
    pub application_deadline: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = events)]
pub struct NewEvent {
    pub organiser_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub event_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub event_type: String,
    pub payment_per_day: Option<i32>,
    pub volunteers_required: i32,
    pub application_deadline: NaiveDate,
    pub status: String,
}

/// Full replacement of the mutable columns; `None` clears nullable fields.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = events, treat_none_as_null = true)]
pub struct EventChanges {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub event_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub event_type: String,
    pub payment_per_day: Option<i32>,
    pub volunteers_required: i32,
    pub application_deadline: NaiveDate,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = event_categories)]
pub struct NewEventCategory {
    pub event_id: Uuid,
    pub category_id: Uuid,
}

// --- Application ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = applications)]
pub struct Application {
    pub id: Uuid,
    pub event_id: Uuid,
    pub volunteer_id: Uuid,
    pub status: String,
    pub compensation_status: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = applications)]
pub struct NewApplication {
    pub event_id: Uuid,
    pub volunteer_id: Uuid,
    pub status: String,
}

// --- Rating ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = ratings)]
pub struct Rating {
    pub id: Uuid,
    pub event_id: Uuid,
    pub rater_id: Uuid,
    pub ratee_id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ratings)]
pub struct NewRating {
    pub event_id: Uuid,
    pub rater_id: Uuid,
    pub ratee_id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
}

// --- Chat ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = chat_threads)]
pub struct ChatThread {
    pub id: Uuid,
    pub event_id: Uuid,
    pub organiser_id: Uuid,
    pub volunteer_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ChatThread {
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.organiser_id == user_id || self.volunteer_id == user_id
    }

    /// The other member; `None` when `user_id` is not on the thread.
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.organiser_id {
            Some(self.volunteer_id)
        } else if user_id == self.volunteer_id {
            Some(self.organiser_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_threads)]
pub struct NewChatThread {
    pub event_id: Uuid,
    pub organiser_id: Uuid,
    pub volunteer_id: Uuid,
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = chat_messages)]
pub struct ChatMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage {
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
}

// --- Device tokens ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = device_tokens)]
pub struct DeviceToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = device_tokens)]
pub struct NewDeviceToken {
    pub user_id: Uuid,
    pub token: String,
    pub platform: String,
}

// --- Verification ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = verification_requests)]
pub struct VerificationRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub remark: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}
