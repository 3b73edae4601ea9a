use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use voluntr_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Event, EventChanges, NewEvent, NewEventCategory};
use crate::schema::{categories, event_categories, events};
use crate::services::lifecycle::{ComputedStatus, EventStatus, Schedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Paid,
    Unpaid,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Paid => "paid",
            EventType::Unpaid => "unpaid",
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(EventType::Paid),
            "unpaid" => Ok(EventType::Unpaid),
            _ => Err(format!("unknown event type: {s}")),
        }
    }
}

/// Body of `POST /events` and `PUT /events/:id`. On update, absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EventInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub location: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub event_type: Option<EventType>,
    pub payment_per_day: Option<i32>,
    #[validate(range(min = 1, max = 10000))]
    pub volunteers_required: Option<i32>,
    pub application_deadline: Option<NaiveDate>,
    pub status: Option<EventStatus>,
    pub categories: Option<Vec<Uuid>>,
}

/// An event that passed every creation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub schedule: Schedule,
    pub event_type: EventType,
    pub payment_per_day: Option<i32>,
    pub volunteers_required: i32,
    pub application_deadline: NaiveDate,
    pub status: EventStatus,
}

fn missing(field: &str) -> AppError {
    AppError::new(ErrorCode::ValidationError, format!("{field} is required"))
}

fn non_blank(value: Option<String>, field: &str) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(missing(field)),
    }
}

impl EventInput {
    /// Checks required fields and cross-field rules. Drafts may omit the schedule times.
    pub fn into_valid(self) -> AppResult<ValidEvent> {
        self.validate().map_err(|e| {
            let fields = serde_json::to_value(e.field_errors()).unwrap_or_default();
            AppError::with_details(ErrorCode::ValidationError, "invalid event fields", fields)
        })?;

        let status = self.status.unwrap_or(EventStatus::Open);
        let is_draft = status == EventStatus::Draft;

        let title = non_blank(self.title, "title")?;
        let location = non_blank(self.location, "location")?;
        let event_date = self.event_date.ok_or_else(|| missing("event_date"))?;
        let volunteers_required = self.volunteers_required.ok_or_else(|| missing("volunteers_required"))?;
        let application_deadline = self
            .application_deadline
            .ok_or_else(|| missing("application_deadline"))?;
        let event_type = self.event_type.ok_or_else(|| missing("event_type"))?;

        if !is_draft {
            if self.start_time.is_none() {
                return Err(missing("start_time"));
            }
            if self.end_time.is_none() {
                return Err(missing("end_time"));
            }
            if self.end_date.is_none() {
                return Err(missing("end_date"));
            }
        }

        let payment_per_day = match event_type {
            EventType::Paid => match self.payment_per_day {
                Some(amount) if amount > 0 => Some(amount),
                _ => {
                    return Err(AppError::new(
                        ErrorCode::ValidationError,
                        "Payment per day is required for paid events",
                    ))
                }
            },
            EventType::Unpaid => None,
        };

        let schedule = Schedule {
            event_date,
            end_date: self.end_date,
            start_time: self.start_time,
            end_time: self.end_time,
        };

        if self.end_date.is_some_and(|end| end < event_date) || schedule.end() < schedule.start() {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "event cannot end before it starts",
            ));
        }

        Ok(ValidEvent {
            title,
            description: self.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            location,
            schedule,
            event_type,
            payment_per_day,
            volunteers_required,
            application_deadline,
            status,
        })
    }

    /// Fills absent fields from the stored event.
    pub fn merged_over(self, event: &Event) -> EventInput {
        EventInput {
            title: self.title.or_else(|| Some(event.title.clone())),
            description: self.description.or_else(|| event.description.clone()),
            location: self.location.or_else(|| Some(event.location.clone())),
            event_date: self.event_date.or(Some(event.event_date)),
            end_date: self.end_date.or(event.end_date),
            start_time: self.start_time.or(event.start_time),
            end_time: self.end_time.or(event.end_time),
            event_type: self.event_type.or_else(|| event.event_type.parse().ok()),
            payment_per_day: self.payment_per_day.or(event.payment_per_day),
            volunteers_required: self.volunteers_required.or(Some(event.volunteers_required)),
            application_deadline: self.application_deadline.or(Some(event.application_deadline)),
            status: self.status.or_else(|| event.status.parse().ok()),
            categories: self.categories,
        }
    }
}

/// Event plus the fields derived at read time.
#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub computed_status: ComputedStatus,
    pub categories: Vec<String>,
}

impl EventView {
    pub fn new(event: Event, categories: Vec<String>, now: DateTime<Utc>) -> Self {
        let computed_status = event.computed_status(now);
        Self { event, computed_status, categories }
    }
}

/// Loads an event that is not soft-deleted.
pub fn load_event(conn: &mut PgConnection, event_id: Uuid) -> AppResult<Event> {
    events::table
        .find(event_id)
        .first::<Event>(conn)
        .optional()?
        .filter(|e| !e.is_deleted())
        .ok_or_else(|| AppError::new(ErrorCode::EventNotFound, "Event not found"))
}

/// Same as [`load_event`] but also hides events the organiser does not own.
pub fn load_owned_event(conn: &mut PgConnection, event_id: Uuid, organiser_id: Uuid) -> AppResult<Event> {
    let event = load_event(conn, event_id)?;
    if event.organiser_id != organiser_id {
        return Err(AppError::new(ErrorCode::EventNotFound, "Event not found"));
    }
    Ok(event)
}

fn ensure_categories_exist(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let found: i64 = categories::table
        .filter(categories::id.eq_any(ids.to_vec()))
        .count()
        .get_result(conn)?;
    if found as usize != ids.len() {
        return Err(AppError::new(ErrorCode::ValidationError, "unknown category"));
    }
    Ok(())
}

fn replace_categories(conn: &mut PgConnection, event_id: Uuid, ids: &[Uuid]) -> QueryResult<()> {
    diesel::delete(event_categories::table.filter(event_categories::event_id.eq(event_id)))
        .execute(conn)?;
    if ids.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewEventCategory> = ids
        .iter()
        .map(|&category_id| NewEventCategory { event_id, category_id })
        .collect();
    diesel::insert_into(event_categories::table)
        .values(&rows)
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

fn unique_categories(ids: Option<Vec<Uuid>>) -> Option<Vec<Uuid>> {
    ids.map(|ids| {
        let mut seen = std::collections::HashSet::new();
        ids.into_iter().filter(|id| seen.insert(*id)).collect()
    })
}

pub fn create_event(conn: &mut PgConnection, organiser_id: Uuid, input: EventInput) -> AppResult<Event> {
    if matches!(input.status, Some(s) if s != EventStatus::Draft && s != EventStatus::Open) {
        return Err(AppError::new(
            ErrorCode::InvalidEventStatus,
            "new events must be draft or open",
        ));
    }
    let category_ids = unique_categories(input.categories.clone()).unwrap_or_default();
    let valid = input.into_valid()?;
    ensure_categories_exist(conn, &category_ids)?;

    let event = conn.transaction::<Event, AppError, _>(|conn| {
        let event: Event = diesel::insert_into(events::table)
            .values(&NewEvent {
                organiser_id,
                title: valid.title,
                description: valid.description,
                location: valid.location,
                event_date: valid.schedule.event_date,
                end_date: valid.schedule.end_date,
                start_time: valid.schedule.start_time,
                end_time: valid.schedule.end_time,
                event_type: valid.event_type.as_str().to_string(),
                payment_per_day: valid.payment_per_day,
                volunteers_required: valid.volunteers_required,
                application_deadline: valid.application_deadline,
                status: valid.status.as_str().to_string(),
            })
            .get_result(conn)?;
        replace_categories(conn, event.id, &category_ids)?;
        Ok(event)
    })?;

    tracing::info!(event_id = %event.id, organiser_id = %organiser_id, status = %event.status, "event created");
    Ok(event)
}

pub fn update_event(
    conn: &mut PgConnection,
    event_id: Uuid,
    organiser_id: Uuid,
    patch: EventInput,
) -> AppResult<Event> {
    let existing = load_owned_event(conn, event_id, organiser_id)?;

    if patch.status == Some(EventStatus::Deleted) {
        return Err(AppError::new(
            ErrorCode::InvalidEventStatus,
            "events are removed by an administrator",
        ));
    }

    let category_ids = unique_categories(patch.categories.clone());
    let valid = patch.merged_over(&existing).into_valid()?;
    if let Some(ids) = &category_ids {
        ensure_categories_exist(conn, ids)?;
    }

    let event = conn.transaction::<Event, AppError, _>(|conn| {
        let event: Event = diesel::update(events::table.find(event_id))
            .set(&EventChanges {
                title: valid.title,
                description: valid.description,
                location: valid.location,
                event_date: valid.schedule.event_date,
                end_date: valid.schedule.end_date,
                start_time: valid.schedule.start_time,
                end_time: valid.schedule.end_time,
                event_type: valid.event_type.as_str().to_string(),
                payment_per_day: valid.payment_per_day,
                volunteers_required: valid.volunteers_required,
                application_deadline: valid.application_deadline,
                status: valid.status.as_str().to_string(),
                updated_at: Utc::now(),
            })
            .get_result(conn)?;
        if let Some(ids) = &category_ids {
            replace_categories(conn, event_id, ids)?;
        }
        Ok(event)
    })?;

    tracing::info!(event_id = %event_id, organiser_id = %organiser_id, "event updated");
    Ok(event)
}

/// Admin removal. The row stays; every read path treats it as gone.
pub fn soft_delete_event(conn: &mut PgConnection, event_id: Uuid) -> AppResult<Event> {
    let event = load_event(conn, event_id)?;
    let deleted: Event = diesel::update(events::table.find(event.id))
        .set((
            events::status.eq(EventStatus::Deleted.as_str()),
            events::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)?;

    tracing::info!(event_id = %event_id, organiser_id = %deleted.organiser_id, "event deleted by admin");
    Ok(deleted)
}

pub fn category_names(conn: &mut PgConnection, event_ids: &[Uuid]) -> QueryResult<HashMap<Uuid, Vec<String>>> {
    if event_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, String)> = event_categories::table
        .inner_join(categories::table)
        .filter(event_categories::event_id.eq_any(event_ids.to_vec()))
        .order(categories::name.asc())
        .select((event_categories::event_id, categories::name))
        .load(conn)?;

    let mut map: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (event_id, name) in rows {
        map.entry(event_id).or_default().push(name);
    }
    Ok(map)
}

fn into_views(conn: &mut PgConnection, rows: Vec<Event>) -> AppResult<Vec<EventView>> {
    let ids: Vec<Uuid> = rows.iter().map(|e| e.id).collect();
    let mut names = category_names(conn, &ids)?;
    let now = Utc::now();
    Ok(rows
        .into_iter()
        .map(|event| {
            let cats = names.remove(&event.id).unwrap_or_default();
            EventView::new(event, cats, now)
        })
        .collect())
}

/// Public listing: open events, soonest first.
pub fn list_open(conn: &mut PgConnection) -> AppResult<Vec<EventView>> {
    let rows = events::table
        .filter(events::status.eq(EventStatus::Open.as_str()))
        .order((events::event_date.asc(), events::start_time.asc()))
        .load::<Event>(conn)?;
    into_views(conn, rows)
}

pub fn list_for_organiser(conn: &mut PgConnection, organiser_id: Uuid) -> AppResult<Vec<EventView>> {
    let rows = events::table
        .filter(events::organiser_id.eq(organiser_id))
        .filter(events::status.ne(EventStatus::Deleted.as_str()))
        .order(events::event_date.desc())
        .load::<Event>(conn)?;
    into_views(conn, rows)
}

/// Drafts are only visible to their owner.
pub fn get_visible(conn: &mut PgConnection, event_id: Uuid, viewer: Option<Uuid>) -> AppResult<EventView> {
    let event = load_event(conn, event_id)?;
    if event.lifecycle_status() == EventStatus::Draft && viewer != Some(event.organiser_id) {
        return Err(AppError::new(ErrorCode::EventNotFound, "Event not found"));
    }
    into_views(conn, vec![event])?
        .pop()
        .ok_or_else(|| AppError::new(ErrorCode::EventNotFound, "Event not found"))
}
