use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use voluntr_shared::clients::db::checkout;
use voluntr_shared::errors::{AppError, AppResult, ErrorCode};
use voluntr_shared::middleware::{JsonBody, OrganiserUser, PathParam, VolunteerUser};
use voluntr_shared::types::api::ApiResponse;
use voluntr_shared::types::auth::AuthUser;

use crate::models::Application;
use crate::services::applications::{
    self, ApplicantView, ApplicationStatus, ApplicationStatusView, CompensationStatus, MyApplicationView,
};
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CompensationRequest {
    #[serde(alias = "compensationStatus")]
    pub compensation_status: String,
}

// --- Handlers ---

/// POST /events/:id/apply
pub async fn apply(
    VolunteerUser(volunteer): VolunteerUser,
    State(state): State<Arc<AppState>>,
    PathParam(event_id): PathParam<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<Application>>)> {
    let mut conn = checkout(&state.db)?;
    let application = applications::apply(&mut conn, event_id, volunteer.id, Utc::now())?;
    Ok(ApiResponse::created(application))
}

/// GET /events/:id/application-status
pub async fn application_status(
    VolunteerUser(volunteer): VolunteerUser,
    State(state): State<Arc<AppState>>,
    PathParam(event_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<ApplicationStatusView>>> {
    let mut conn = checkout(&state.db)?;
    let view = applications::application_status(&mut conn, event_id, volunteer.id)?;
    Ok(Json(ApiResponse::ok(view)))
}

/// GET /events/:id/applications - owner only
pub async fn event_applications(
    OrganiserUser(organiser): OrganiserUser,
    State(state): State<Arc<AppState>>,
    PathParam(event_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<ApplicantView>>>> {
    let mut conn = checkout(&state.db)?;
    let applicants = applications::list_for_event(&mut conn, event_id, organiser.id)?;
    Ok(Json(ApiResponse::ok(applicants)))
}

/// GET /applications/my
pub async fn my_applications(
    VolunteerUser(volunteer): VolunteerUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<MyApplicationView>>>> {
    let mut conn = checkout(&state.db)?;
    Ok(Json(ApiResponse::ok(applications::list_mine(&mut conn, volunteer.id)?)))
}

/// GET /applications/:id
pub async fn get_application(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(application_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Application>>> {
    let mut conn = checkout(&state.db)?;
    let application = applications::get_for_viewer(&mut conn, application_id, &auth_user)?;
    Ok(Json(ApiResponse::ok(application)))
}

/// PUT /applications/:id/status - organiser review; the volunteer is notified on change
pub async fn update_status(
    OrganiserUser(organiser): OrganiserUser,
    State(state): State<Arc<AppState>>,
    PathParam(application_id): PathParam<Uuid>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> AppResult<Json<ApiResponse<Application>>> {
    let next: ApplicationStatus = body
        .status
        .trim()
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::ValidationError, e))?;

    let change = {
        let mut conn = checkout(&state.db)?;
        applications::update_status(&mut conn, application_id, organiser.id, next)?
    };

    if let Some(message) = change.notification() {
        state
            .notifier
            .spawn_notify(vec![change.application.volunteer_id], message);
    }

    Ok(Json(ApiResponse::ok(change.application)))
}

/// PUT /applications/:id/compensation
pub async fn update_compensation(
    VolunteerUser(volunteer): VolunteerUser,
    State(state): State<Arc<AppState>>,
    PathParam(application_id): PathParam<Uuid>,
    JsonBody(body): JsonBody<CompensationRequest>,
) -> AppResult<Json<ApiResponse<Application>>> {
    let requested: CompensationStatus = body
        .compensation_status
        .trim()
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::InvalidCompensationStatus, e))?;

    let mut conn = checkout(&state.db)?;
    let application = applications::update_compensation(&mut conn, application_id, volunteer.id, requested)?;
    Ok(Json(ApiResponse::ok(application)))
}

/// PUT /applications/:id/cancel
pub async fn cancel_application(
    VolunteerUser(volunteer): VolunteerUser,
    State(state): State<Arc<AppState>>,
    PathParam(application_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Application>>> {
    let mut conn = checkout(&state.db)?;
    let application = applications::cancel_by_volunteer(&mut conn, application_id, volunteer.id)?;
    Ok(Json(ApiResponse::ok_with_message(application, "Application cancelled")))
}
