use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use voluntr_shared::clients::db::checkout;
use voluntr_shared::errors::AppResult;
use voluntr_shared::middleware::{JsonBody, OrganiserUser, PathParam};
use voluntr_shared::types::api::ApiResponse;
use voluntr_shared::types::auth::AuthUser;

use crate::services::events::{self, EventInput, EventView};
use crate::models::Event;
use crate::AppState;

fn with_categories(conn: &mut diesel::PgConnection, event: Event) -> AppResult<EventView> {
    let mut names = events::category_names(conn, &[event.id])?;
    let categories = names.remove(&event.id).unwrap_or_default();
    Ok(EventView::new(event, categories, Utc::now()))
}

/// POST /events
pub async fn create_event(
    OrganiserUser(organiser): OrganiserUser,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<EventInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<EventView>>)> {
    let mut conn = checkout(&state.db)?;
    let event = events::create_event(&mut conn, organiser.id, body)?;
    Ok(ApiResponse::created(with_categories(&mut conn, event)?))
}

/// PUT /events/:id
pub async fn update_event(
    OrganiserUser(organiser): OrganiserUser,
    State(state): State<Arc<AppState>>,
    PathParam(event_id): PathParam<Uuid>,
    JsonBody(body): JsonBody<EventInput>,
) -> AppResult<Json<ApiResponse<EventView>>> {
    let mut conn = checkout(&state.db)?;
    let event = events::update_event(&mut conn, event_id, organiser.id, body)?;
    Ok(Json(ApiResponse::ok(with_categories(&mut conn, event)?)))
}

/// GET /events - open events, soonest first
pub async fn list_events(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<EventView>>>> {
    let mut conn = checkout(&state.db)?;
    Ok(Json(ApiResponse::ok(events::list_open(&mut conn)?)))
}

/// GET /events/my-events
pub async fn my_events(
    OrganiserUser(organiser): OrganiserUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<EventView>>>> {
    let mut conn = checkout(&state.db)?;
    Ok(Json(ApiResponse::ok(events::list_for_organiser(&mut conn, organiser.id)?)))
}

/// GET /events/:id - public; drafts only for their owner
pub async fn get_event(
    viewer: Option<AuthUser>,
    State(state): State<Arc<AppState>>,
    PathParam(event_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<EventView>>> {
    let mut conn = checkout(&state.db)?;
    let view = events::get_visible(&mut conn, event_id, viewer.map(|u| u.id))?;
    Ok(Json(ApiResponse::ok(view)))
}
