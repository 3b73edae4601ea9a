use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use voluntr_shared::clients::db::checkout;
use voluntr_shared::errors::AppResult;
use voluntr_shared::middleware::{AdminUser, JsonBody, PathParam};
use voluntr_shared::types::api::ApiResponse;

use crate::models::{Application, Event, VerificationRequest};
use crate::services::{applications, events, verification};
use crate::services::verification::VerificationRequestView;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    #[serde(alias = "request_id")]
    pub request_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    #[serde(alias = "request_id")]
    pub request_id: Uuid,
    pub remark: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletedResponse {
    pub event_id: Uuid,
    pub completed: usize,
}

/// DELETE /admin/events/:id - soft delete
pub async fn delete_event(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    PathParam(event_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Event>>> {
    let mut conn = checkout(&state.db)?;
    let event = events::soft_delete_event(&mut conn, event_id)?;
    tracing::info!(admin_id = %admin.id, event_id = %event_id, "event deleted by admin");
    Ok(Json(ApiResponse::ok_with_message(event, "Event deleted")))
}

/// PUT /admin/applications/:id/cancel
pub async fn cancel_application(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    PathParam(application_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Application>>> {
    let mut conn = checkout(&state.db)?;
    let application = applications::cancel_by_admin(&mut conn, application_id)?;
    tracing::info!(admin_id = %admin.id, application_id = %application_id, "application cancelled by admin");
    Ok(Json(ApiResponse::ok_with_message(application, "Application cancelled")))
}

/// POST /admin/events/:id/complete-applications
pub async fn complete_applications(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    PathParam(event_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<CompletedResponse>>> {
    let mut conn = checkout(&state.db)?;
    let completed = applications::complete_for_event(&mut conn, event_id, Utc::now())?;
    tracing::info!(admin_id = %admin.id, event_id = %event_id, completed, "applications completed");
    Ok(Json(ApiResponse::ok(CompletedResponse { event_id, completed })))
}

/// GET /admin/verification-requests
pub async fn verification_requests(
    AdminUser(_admin): AdminUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<VerificationRequestView>>>> {
    let mut conn = checkout(&state.db)?;
    Ok(Json(ApiResponse::ok(verification::list_requests(&mut conn)?)))
}

/// POST /admin/verification/approve
pub async fn approve_verification(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<ApproveRequest>,
) -> AppResult<Json<ApiResponse<VerificationRequest>>> {
    let mut conn = checkout(&state.db)?;
    let request = verification::approve(&mut conn, body.request_id, admin.id)?;
    Ok(Json(ApiResponse::ok_with_message(request, "User verified successfully")))
}

/// POST /admin/verification/reject
pub async fn reject_verification(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RejectRequest>,
) -> AppResult<Json<ApiResponse<VerificationRequest>>> {
    let mut conn = checkout(&state.db)?;
    let request = verification::reject(&mut conn, body.request_id, admin.id, body.remark)?;
    Ok(Json(ApiResponse::ok_with_message(request, "Verification rejected")))
}
