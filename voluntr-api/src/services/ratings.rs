use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use voluntr_shared::errors::{AppError, AppResult, ErrorCode};
use voluntr_shared::types::auth::{AuthUser, UserRole};
use voluntr_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::{NewRating, Rating};
use crate::schema::{ratings, users};
use crate::services::applications::participated;
use crate::services::events::load_event;

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct RatingInput {
    pub event_id: Uuid,
    pub ratee_id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
}

/// Checks that need no stored state.
pub fn check_basic(rater_id: Uuid, input: &RatingInput) -> AppResult<()> {
    if input.ratee_id == rater_id {
        return Err(AppError::new(ErrorCode::CannotRateSelf, "Cannot rate yourself"));
    }
    if !(MIN_SCORE..=MAX_SCORE).contains(&input.score) {
        return Err(AppError::new(ErrorCode::InvalidScore, "Score must be 1-5"));
    }
    Ok(())
}

pub fn give_rating(conn: &mut PgConnection, rater: &AuthUser, input: RatingInput, now: DateTime<Utc>) -> AppResult<Rating> {
    check_basic(rater.id, &input)?;

    let event = load_event(conn, input.event_id)?;
    if !event.is_rating_eligible(now) {
        return Err(AppError::new(ErrorCode::EventNotCompleted, "Event not completed"));
    }

    match rater.role {
        UserRole::Volunteer => {
            if input.ratee_id != event.organiser_id {
                return Err(AppError::new(ErrorCode::InvalidRatee, "Invalid organiser"));
            }
            if !participated(conn, event.id, rater.id)? {
                return Err(AppError::new(ErrorCode::NotEligibleToRate, "Not eligible to rate"));
            }
        }
        UserRole::Organiser => {
            if event.organiser_id != rater.id {
                return Err(AppError::new(ErrorCode::NotEventOwner, "Not your event"));
            }
            if !participated(conn, event.id, input.ratee_id)? {
                return Err(AppError::new(ErrorCode::NotEligibleToRate, "Volunteer not eligible"));
            }
        }
        UserRole::Admin => {
            return Err(AppError::new(ErrorCode::RoleNotAllowed, "Role not allowed"));
        }
    }

    // Unique (event_id, rater_id, ratee_id): a concurrent duplicate loses here.
    let rating: Rating = diesel::insert_into(ratings::table)
        .values(&NewRating {
            event_id: event.id,
            rater_id: rater.id,
            ratee_id: input.ratee_id,
            score: input.score,
            comment: input.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        })
        .get_result(conn)
        .map_err(|e| AppError::from_insert(e, ErrorCode::AlreadyRated, "Rating already submitted"))?;

    tracing::info!(rating_id = %rating.id, event_id = %event.id, rater_id = %rater.id, ratee_id = %rating.ratee_id, score = rating.score, "rating submitted");
    Ok(rating)
}

pub fn has_rated(conn: &mut PgConnection, event_id: Uuid, rater_id: Uuid, ratee_id: Uuid) -> AppResult<bool> {
    let exists = diesel::select(diesel::dsl::exists(
        ratings::table
            .filter(ratings::event_id.eq(event_id))
            .filter(ratings::rater_id.eq(rater_id))
            .filter(ratings::ratee_id.eq(ratee_id)),
    ))
    .get_result::<bool>(conn)?;
    Ok(exists)
}

#[derive(Debug, Serialize, Queryable)]
pub struct ReceivedRating {
    pub id: Uuid,
    pub event_id: Uuid,
    pub rater_id: Uuid,
    pub ratee_id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub rater_name: Option<String>,
}

pub fn list_received(conn: &mut PgConnection, user_id: Uuid, params: &PaginationParams) -> AppResult<Paginated<ReceivedRating>> {
    let total: i64 = ratings::table
        .filter(ratings::ratee_id.eq(user_id))
        .count()
        .get_result(conn)?;

    let items = ratings::table
        .left_join(users::table)
        .filter(ratings::ratee_id.eq(user_id))
        .order(ratings::created_at.desc())
        .offset(params.offset())
        .limit(params.limit())
        .select((
            ratings::id,
            ratings::event_id,
            ratings::rater_id,
            ratings::ratee_id,
            ratings::score,
            ratings::comment,
            ratings::created_at,
            users::name.nullable(),
        ))
        .load::<ReceivedRating>(conn)?;

    Ok(Paginated::new(items, total as u64, params))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatingSummary {
    pub user_id: Uuid,
    pub rating: f64,
    pub review_count: usize,
    pub event_count: usize,
}

/// Averages each event first, then averages those, so one busy event cannot dominate.
pub fn mean_of_event_means(scores: &[(Uuid, i32)]) -> Option<f64> {
    let mut per_event: HashMap<Uuid, (i64, i64)> = HashMap::new();
    for &(event_id, score) in scores {
        let entry = per_event.entry(event_id).or_default();
        entry.0 += i64::from(score);
        entry.1 += 1;
    }
    if per_event.is_empty() {
        return None;
    }
    let total: f64 = per_event
        .values()
        .map(|&(sum, count)| sum as f64 / count as f64)
        .sum();
    Some(total / per_event.len() as f64)
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn summarize(user_id: Uuid, scores: &[(Uuid, i32)]) -> RatingSummary {
    let event_count = scores
        .iter()
        .map(|(event_id, _)| *event_id)
        .collect::<std::collections::HashSet<_>>()
        .len();
    RatingSummary {
        user_id,
        rating: mean_of_event_means(scores).map(round_to_tenth).unwrap_or(0.0),
        review_count: scores.len(),
        event_count,
    }
}

pub fn summary(conn: &mut PgConnection, user_id: Uuid) -> AppResult<RatingSummary> {
    let scores: Vec<(Uuid, i32)> = ratings::table
        .filter(ratings::ratee_id.eq(user_id))
        .select((ratings::event_id, ratings::score))
        .load(conn)?;
    Ok(summarize(user_id, &scores))
}
