use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use voluntr_shared::clients::push::PushMessage;
use voluntr_shared::errors::{AppError, AppResult, ErrorCode};
use voluntr_shared::types::auth::{AuthUser, UserRole};

use crate::models::{Application, Event, NewApplication};
use crate::schema::{applications, events, users};
use crate::services::events::{category_names, load_event, load_owned_event};
use crate::services::lifecycle::{ComputedStatus, EventStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Statuses an organiser may set while reviewing.
    pub fn is_review_decision(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted | Self::Rejected)
    }

    /// Participation that entitles both sides to rate each other.
    pub fn counts_as_participation(&self) -> bool {
        matches!(self, Self::Accepted | Self::Completed)
    }

    pub fn can_become(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        match (*self, next) {
            (from, to) if from == to => false,
            (Pending | Accepted | Rejected, Pending | Accepted | Rejected) => true,
            (Pending | Accepted, Cancelled) => true,
            (Accepted, Completed) => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("unknown application status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationStatus {
    Pending,
    Received,
    NotApplicable,
}

impl CompensationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Received => "received",
            Self::NotApplicable => "not_applicable",
        }
    }

    /// Unpaid events never carry a compensation state.
    pub fn effective(requested: CompensationStatus, event_is_paid: bool) -> CompensationStatus {
        if event_is_paid {
            requested
        } else {
            Self::NotApplicable
        }
    }

    /// Value shown to the volunteer, derived from the stored column.
    pub fn derived(stored: Option<&str>, event_is_paid: bool) -> CompensationStatus {
        if !event_is_paid {
            return Self::NotApplicable;
        }
        stored.and_then(|s| s.parse().ok()).unwrap_or(Self::Pending)
    }
}

impl std::str::FromStr for CompensationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "received" => Ok(Self::Received),
            "not_applicable" => Ok(Self::NotApplicable),
            _ => Err(format!("unknown compensation status: {s}")),
        }
    }
}

fn stored_status(app: &Application) -> AppResult<ApplicationStatus> {
    app.status
        .parse()
        .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))
}

fn not_found() -> AppError {
    AppError::new(ErrorCode::ApplicationNotFound, "Application not found")
}

/// Applications close at the end of the deadline day.
pub fn deadline_passed(deadline: NaiveDate, today: NaiveDate) -> bool {
    today > deadline
}

pub fn apply(conn: &mut PgConnection, event_id: Uuid, volunteer_id: Uuid, now: DateTime<Utc>) -> AppResult<Application> {
    let event = load_event(conn, event_id)?;

    if event.lifecycle_status() != EventStatus::Open {
        return Err(AppError::new(ErrorCode::EventNotOpen, "Event is not accepting applications"));
    }
    if deadline_passed(event.application_deadline, now.date_naive()) {
        return Err(AppError::new(
            ErrorCode::ApplicationDeadlinePassed,
            "Application deadline has passed",
        ));
    }

    // The unique index on (event_id, volunteer_id) decides concurrent duplicates.
    let application: Application = diesel::insert_into(applications::table)
        .values(&NewApplication {
            event_id,
            volunteer_id,
            status: ApplicationStatus::Pending.as_str().to_string(),
        })
        .get_result(conn)
        .map_err(|e| AppError::from_insert(e, ErrorCode::AlreadyApplied, "Already applied"))?;

    tracing::info!(application_id = %application.id, event_id = %event_id, volunteer_id = %volunteer_id, "application submitted");
    Ok(application)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ApplicationStatusView {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

pub fn application_status(conn: &mut PgConnection, event_id: Uuid, volunteer_id: Uuid) -> AppResult<ApplicationStatusView> {
    let status = applications::table
        .filter(applications::event_id.eq(event_id))
        .filter(applications::volunteer_id.eq(volunteer_id))
        .select(applications::status)
        .first::<String>(conn)
        .optional()?;

    Ok(ApplicationStatusView {
        applied: status.is_some(),
        status,
    })
}

#[derive(Debug, Serialize, Queryable)]
pub struct ApplicantView {
    pub id: Uuid,
    pub volunteer_id: Uuid,
    pub volunteer_name: String,
    pub status: String,
    pub compensation_status: Option<String>,
    pub applied_at: DateTime<Utc>,
}

pub fn list_for_event(conn: &mut PgConnection, event_id: Uuid, organiser_id: Uuid) -> AppResult<Vec<ApplicantView>> {
    load_owned_event(conn, event_id, organiser_id)?;

    let rows = applications::table
        .inner_join(users::table)
        .filter(applications::event_id.eq(event_id))
        .order(applications::applied_at.desc())
        .select((
            applications::id,
            applications::volunteer_id,
            users::name,
            applications::status,
            applications::compensation_status,
            applications::applied_at,
        ))
        .load::<ApplicantView>(conn)?;

    Ok(rows)
}

/// Loads an application together with its event.
fn load_with_event(conn: &mut PgConnection, application_id: Uuid) -> AppResult<(Application, Event)> {
    applications::table
        .inner_join(events::table)
        .filter(applications::id.eq(application_id))
        .select((applications::all_columns, events::all_columns))
        .first::<(Application, Event)>(conn)
        .optional()?
        .ok_or_else(not_found)
}

fn set_status(conn: &mut PgConnection, application_id: Uuid, status: ApplicationStatus) -> QueryResult<Application> {
    diesel::update(applications::table.find(application_id))
        .set((
            applications::status.eq(status.as_str()),
            applications::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)
}

#[derive(Debug)]
pub struct StatusChange {
    pub application: Application,
    pub event_title: String,
    pub changed: bool,
}

impl StatusChange {
    /// Volunteers hear about approvals and rejections only.
    pub fn notification(&self) -> Option<PushMessage> {
        if !self.changed {
            return None;
        }
        let verdict = match self.application.status.parse().ok()? {
            ApplicationStatus::Accepted => "approved",
            ApplicationStatus::Rejected => "rejected",
            _ => return None,
        };
        Some(
            PushMessage::new(
                "Application update",
                format!("Your application for {} was {}", self.event_title, verdict),
            )
            .with_data("type", "application_status")
            .with_data("applicationId", self.application.id)
            .with_data("eventId", self.application.event_id)
            .with_data("status", &self.application.status),
        )
    }
}

/// Organiser review. Only the event owner sees the application.
pub fn update_status(
    conn: &mut PgConnection,
    application_id: Uuid,
    organiser_id: Uuid,
    next: ApplicationStatus,
) -> AppResult<StatusChange> {
    if !next.is_review_decision() {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "status must be pending, accepted or rejected",
        ));
    }

    let (application, event) = load_with_event(conn, application_id)?;
    if event.organiser_id != organiser_id || event.is_deleted() {
        return Err(not_found());
    }

    let current = stored_status(&application)?;
    if current == next {
        return Ok(StatusChange { application, event_title: event.title, changed: false });
    }
    if !current.can_become(next) {
        return Err(AppError::new(
            ErrorCode::InvalidStatusTransition,
            format!("cannot change a {} application to {}", current.as_str(), next.as_str()),
        ));
    }

    let application = set_status(conn, application_id, next)?;
    tracing::info!(application_id = %application_id, from = current.as_str(), to = next.as_str(), "application status updated");

    Ok(StatusChange { application, event_title: event.title, changed: true })
}

pub fn update_compensation(
    conn: &mut PgConnection,
    application_id: Uuid,
    volunteer_id: Uuid,
    requested: CompensationStatus,
) -> AppResult<Application> {
    let (application, event) = load_with_event(conn, application_id)?;
    if application.volunteer_id != volunteer_id {
        return Err(not_found());
    }

    let status = CompensationStatus::effective(requested, event.is_paid());
    let application = diesel::update(applications::table.find(application_id))
        .set((
            applications::compensation_status.eq(Some(status.as_str())),
            applications::updated_at.eq(Utc::now()),
        ))
        .get_result::<Application>(conn)?;

    tracing::info!(application_id = %application_id, compensation = status.as_str(), "compensation status updated");
    Ok(application)
}

fn cancel(conn: &mut PgConnection, application: Application) -> AppResult<Application> {
    let current = stored_status(&application)?;
    if !current.can_become(ApplicationStatus::Cancelled) {
        return Err(AppError::new(
            ErrorCode::InvalidStatusTransition,
            format!("cannot cancel a {} application", current.as_str()),
        ));
    }
    let cancelled = set_status(conn, application.id, ApplicationStatus::Cancelled)?;
    tracing::info!(application_id = %cancelled.id, from = current.as_str(), "application cancelled");
    Ok(cancelled)
}

pub fn cancel_by_volunteer(conn: &mut PgConnection, application_id: Uuid, volunteer_id: Uuid) -> AppResult<Application> {
    let (application, _) = load_with_event(conn, application_id)?;
    if application.volunteer_id != volunteer_id {
        return Err(not_found());
    }
    cancel(conn, application)
}

pub fn cancel_by_admin(conn: &mut PgConnection, application_id: Uuid) -> AppResult<Application> {
    let (application, _) = load_with_event(conn, application_id)?;
    cancel(conn, application)
}

/// Owning volunteer, owning organiser, or an admin.
pub fn get_for_viewer(conn: &mut PgConnection, application_id: Uuid, viewer: &AuthUser) -> AppResult<Application> {
    let (application, event) = load_with_event(conn, application_id)?;
    let visible = match viewer.role {
        UserRole::Admin => true,
        UserRole::Volunteer => application.volunteer_id == viewer.id,
        UserRole::Organiser => event.organiser_id == viewer.id,
    };
    if !visible {
        return Err(not_found());
    }
    Ok(application)
}

#[derive(Debug, Serialize)]
pub struct MyApplicationView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub status: String,
    pub applied_at: DateTime<Utc>,
    pub compensation_status: CompensationStatus,
    pub title: String,
    pub location: String,
    pub event_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub event_type: String,
    pub payment_per_day: Option<i32>,
    pub computed_status: ComputedStatus,
    pub categories: Vec<String>,
}

pub fn list_mine(conn: &mut PgConnection, volunteer_id: Uuid) -> AppResult<Vec<MyApplicationView>> {
    let rows = applications::table
        .inner_join(events::table)
        .filter(applications::volunteer_id.eq(volunteer_id))
        .order(applications::applied_at.desc())
        .select((applications::all_columns, events::all_columns))
        .load::<(Application, Event)>(conn)?;

    let event_ids: Vec<Uuid> = rows.iter().map(|(_, e)| e.id).collect();
    let mut names = category_names(conn, &event_ids)?;
    let now = Utc::now();

    Ok(rows
        .into_iter()
        .map(|(app, event)| MyApplicationView {
            compensation_status: CompensationStatus::derived(app.compensation_status.as_deref(), event.is_paid()),
            computed_status: event.computed_status(now),
            categories: names.remove(&event.id).unwrap_or_default(),
            id: app.id,
            event_id: event.id,
            status: app.status,
            applied_at: app.applied_at,
            title: event.title,
            location: event.location,
            event_date: event.event_date,
            end_date: event.end_date,
            start_time: event.start_time,
            end_time: event.end_time,
            event_type: event.event_type,
            payment_per_day: event.payment_per_day,
        })
        .collect())
}

/// Whether the volunteer took part in the event (accepted or completed).
pub fn participated(conn: &mut PgConnection, event_id: Uuid, volunteer_id: Uuid) -> AppResult<bool> {
    let statuses: Vec<String> = applications::table
        .filter(applications::event_id.eq(event_id))
        .filter(applications::volunteer_id.eq(volunteer_id))
        .select(applications::status)
        .load(conn)?;

    Ok(statuses
        .iter()
        .filter_map(|s| s.parse::<ApplicationStatus>().ok())
        .any(|s| s.counts_as_participation()))
}

/// Admin close-out: accepted applications of a finished event become completed.
pub fn complete_for_event(conn: &mut PgConnection, event_id: Uuid, now: DateTime<Utc>) -> AppResult<usize> {
    let event = load_event(conn, event_id)?;
    if !event.is_rating_eligible(now) {
        return Err(AppError::new(ErrorCode::EventNotCompleted, "Event has not finished yet"));
    }

    let updated = diesel::update(
        applications::table
            .filter(applications::event_id.eq(event_id))
            .filter(applications::status.eq(ApplicationStatus::Accepted.as_str())),
    )
    .set((
        applications::status.eq(ApplicationStatus::Completed.as_str()),
        applications::updated_at.eq(Utc::now()),
    ))
    .execute(conn)?;

    tracing::info!(event_id = %event_id, updated, "accepted applications marked completed");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    #[test]
    fn review_transitions() {
        assert!(Pending.can_become(Accepted));
        assert!(Pending.can_become(Rejected));
        assert!(Accepted.can_become(Rejected));
        assert!(Rejected.can_become(Pending));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [Pending, Accepted, Rejected, Cancelled, Completed] {
            assert!(!Cancelled.can_become(next), "cancelled -> {next:?}");
            assert!(!Completed.can_become(next), "completed -> {next:?}");
        }
    }

    #[test]
    fn cancellation_only_from_pending_or_accepted() {
        assert!(Pending.can_become(Cancelled));
        assert!(Accepted.can_become(Cancelled));
        assert!(!Rejected.can_become(Cancelled));
    }

    #[test]
    fn completion_requires_acceptance() {
        assert!(Accepted.can_become(Completed));
        assert!(!Pending.can_become(Completed));
        assert!(!Rejected.can_become(Completed));
    }

    #[test]
    fn review_decisions_exclude_terminal_states() {
        assert!(Accepted.is_review_decision());
        assert!(!Cancelled.is_review_decision());
        assert!(!Completed.is_review_decision());
    }

    #[test]
    fn participation() {
        assert!(Accepted.counts_as_participation());
        assert!(Completed.counts_as_participation());
        assert!(!Pending.counts_as_participation());
        assert!(!Cancelled.counts_as_participation());
    }

    #[test]
    fn unpaid_events_force_not_applicable() {
        assert_eq!(
            CompensationStatus::effective(CompensationStatus::Received, false),
            CompensationStatus::NotApplicable
        );
        assert_eq!(
            CompensationStatus::effective(CompensationStatus::Received, true),
            CompensationStatus::Received
        );
    }

    #[test]
    fn derived_compensation_defaults_to_pending() {
        assert_eq!(CompensationStatus::derived(None, true), CompensationStatus::Pending);
        assert_eq!(CompensationStatus::derived(Some("received"), true), CompensationStatus::Received);
        assert_eq!(CompensationStatus::derived(Some("received"), false), CompensationStatus::NotApplicable);
    }

    #[test]
    fn compensation_serializes_snake_case() {
        let json = serde_json::to_string(&CompensationStatus::NotApplicable).unwrap();
        assert_eq!(json, "\"not_applicable\"");
    }

    #[test]
    fn deadline_day_still_open() {
        let deadline = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        assert!(!deadline_passed(deadline, deadline));
        assert!(deadline_passed(deadline, deadline.succ_opt().unwrap()));
    }

    fn change(status: &str, changed: bool) -> StatusChange {
        StatusChange {
            application: Application {
                id: Uuid::new_v4(),
                event_id: Uuid::new_v4(),
                volunteer_id: Uuid::new_v4(),
                status: status.into(),
                compensation_status: None,
                applied_at: Utc::now(),
                updated_at: Utc::now(),
            },
            event_title: "Harbour cleanup".into(),
            changed,
        }
    }

    #[test]
    fn approval_notification_text() {
        let msg = change("accepted", true).notification().unwrap();
        assert_eq!(msg.title, "Application update");
        assert_eq!(msg.body, "Your application for Harbour cleanup was approved");
        assert_eq!(msg.data["type"], "application_status");

        let msg = change("rejected", true).notification().unwrap();
        assert_eq!(msg.body, "Your application for Harbour cleanup was rejected");
    }

    #[test]
    fn no_notification_for_pending_or_unchanged() {
        assert!(change("pending", true).notification().is_none());
        assert!(change("accepted", false).notification().is_none());
    }
}
