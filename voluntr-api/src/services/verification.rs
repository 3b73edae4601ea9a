use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use voluntr_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{User, VerificationRequest};
use crate::schema::{users, verification_requests};

pub const PENDING: &str = "pending";
pub const APPROVED: &str = "approved";
pub const REJECTED: &str = "rejected";

#[derive(Debug, Serialize)]
pub struct VerificationRequestView {
    #[serde(flatten)]
    pub request: VerificationRequest,
    pub user: User,
}

pub fn list_requests(conn: &mut PgConnection) -> AppResult<Vec<VerificationRequestView>> {
    let rows = verification_requests::table
        .inner_join(users::table)
        .order(verification_requests::created_at.desc())
        .select((verification_requests::all_columns, users::all_columns))
        .load::<(VerificationRequest, User)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(request, user)| VerificationRequestView { request, user })
        .collect())
}

fn not_found() -> AppError {
    AppError::new(ErrorCode::VerificationRequestNotFound, "Request not found")
}

fn load_pending(conn: &mut PgConnection, request_id: Uuid) -> AppResult<VerificationRequest> {
    let request = verification_requests::table
        .find(request_id)
        .first::<VerificationRequest>(conn)
        .optional()?
        .ok_or_else(not_found)?;

    if request.status != PENDING {
        return Err(AppError::new(
            ErrorCode::Conflict,
            format!("request already {}", request.status),
        ));
    }
    Ok(request)
}

/// Marks the request approved and the user verified in one transaction.
pub fn approve(conn: &mut PgConnection, request_id: Uuid, admin_id: Uuid) -> AppResult<VerificationRequest> {
    let approved = conn.transaction::<VerificationRequest, AppError, _>(|conn| {
        let request = load_pending(conn, request_id)?;
        let now: DateTime<Utc> = Utc::now();

        let approved: VerificationRequest = diesel::update(verification_requests::table.find(request.id))
            .set((
                verification_requests::status.eq(APPROVED),
                verification_requests::reviewed_by.eq(Some(admin_id)),
                verification_requests::reviewed_at.eq(Some(now)),
            ))
            .get_result(conn)?;

        let flipped = diesel::update(users::table.find(request.user_id))
            .set(users::is_verified.eq(true))
            .execute(conn)?;
        if flipped == 0 {
            // Rolls the request update back with it.
            return Err(AppError::new(ErrorCode::NotFound, "User not found"));
        }

        Ok(approved)
    })?;

    tracing::info!(request_id = %request_id, user_id = %approved.user_id, admin_id = %admin_id, "verification approved");
    Ok(approved)
}

pub fn reject(
    conn: &mut PgConnection,
    request_id: Uuid,
    admin_id: Uuid,
    remark: Option<String>,
) -> AppResult<VerificationRequest> {
    let request = load_pending(conn, request_id)?;
    let remark = remark.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());

    let rejected: VerificationRequest = diesel::update(verification_requests::table.find(request.id))
        .set((
            verification_requests::status.eq(REJECTED),
            verification_requests::remark.eq(remark),
            verification_requests::reviewed_by.eq(Some(admin_id)),
            verification_requests::reviewed_at.eq(Some(Utc::now())),
        ))
        .get_result(conn)?;

    tracing::info!(request_id = %request_id, admin_id = %admin_id, "verification rejected");
    Ok(rejected)
}
