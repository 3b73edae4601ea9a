use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use voluntr_shared::clients::db::checkout;
use voluntr_shared::errors::AppResult;
use voluntr_shared::middleware::{JsonBody, PathParam, QueryParams};
use voluntr_shared::types::api::ApiResponse;
use voluntr_shared::types::auth::AuthUser;
use voluntr_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::Rating;
use crate::services::ratings::{self, RatingInput, RatingSummary, ReceivedRating};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub event_id: Uuid,
    pub ratee_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub rated: bool,
}

/// POST /ratings
pub async fn give_rating(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RatingInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Rating>>)> {
    let mut conn = checkout(&state.db)?;
    let rating = ratings::give_rating(&mut conn, &auth_user, body, Utc::now())?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(rating, "Rating submitted")),
    ))
}

/// GET /ratings/check?event_id&ratee_id
pub async fn check_rating(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<CheckQuery>,
) -> AppResult<Json<ApiResponse<CheckResponse>>> {
    let mut conn = checkout(&state.db)?;
    let rated = ratings::has_rated(&mut conn, query.event_id, auth_user.id, query.ratee_id)?;
    Ok(Json(ApiResponse::ok(CheckResponse { rated })))
}

/// GET /ratings/:id - ratings received by a user, newest first
pub async fn ratings_for_user(
    _auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(user_id): PathParam<Uuid>,
    QueryParams(params): QueryParams<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ReceivedRating>>>> {
    let mut conn = checkout(&state.db)?;
    Ok(Json(ApiResponse::ok(ratings::list_received(&mut conn, user_id, &params)?)))
}

/// GET /ratings/:id/summary
pub async fn rating_summary(
    _auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(user_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<RatingSummary>>> {
    let mut conn = checkout(&state.db)?;
    Ok(Json(ApiResponse::ok(ratings::summary(&mut conn, user_id)?)))
}
