use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;
use uuid::Uuid;

use voluntr_shared::clients::db::{checkout, DbPool};
use voluntr_shared::clients::push::{PushClient, PushMessage, PushReport};
use voluntr_shared::errors::{AppError, AppResult, ErrorCode};
use voluntr_shared::middleware::PUSH_NOTIFICATIONS;

use crate::models::{DeviceToken, NewDeviceToken};
use crate::schema::device_tokens;

pub const DEFAULT_PLATFORM: &str = "android";

/// Resolves device tokens and hands payloads to the push client.
#[derive(Clone)]
pub struct Notifier {
    db: DbPool,
    push: PushClient,
}

impl Notifier {
    pub fn new(db: DbPool, push: PushClient) -> Self {
        Self { db, push }
    }

    pub fn push_client(&self) -> &PushClient {
        &self.push
    }

    pub async fn notify_users(&self, user_ids: &[Uuid], message: &PushMessage) -> anyhow::Result<PushReport> {
        let recipients = dedupe_ids(user_ids);
        if recipients.is_empty() {
            return Ok(PushReport::default());
        }

        let tokens = {
            let mut conn = checkout(&self.db)?;
            tokens_for_users(&mut conn, &recipients)?
        };

        tracing::debug!(users = recipients.len(), tokens = tokens.len(), "dispatching push notification");
        let report = self.push.send_to_tokens(&tokens, message).await?;
        Ok(report)
    }

    /// Fire-and-forget delivery. Failures are logged and counted, never returned.
    pub fn spawn_notify(&self, user_ids: Vec<Uuid>, message: PushMessage) {
        let notifier = self.clone();
        tokio::spawn(async move {
            match notifier.notify_users(&user_ids, &message).await {
                Ok(report) => {
                    metrics::counter!(PUSH_NOTIFICATIONS, "outcome" => "sent")
                        .increment(report.sent as u64);
                    if report.failed > 0 {
                        metrics::counter!(PUSH_NOTIFICATIONS, "outcome" => "failed")
                            .increment(report.failed as u64);
                    }
                }
                Err(e) => {
                    metrics::counter!(PUSH_NOTIFICATIONS, "outcome" => "error").increment(1);
                    tracing::error!(error = %e, users = ?user_ids, "push notification failed");
                }
            }
        });
    }
}

/// Order-preserving de-duplication.
pub fn dedupe_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

pub fn tokens_for_users(conn: &mut PgConnection, user_ids: &[Uuid]) -> QueryResult<Vec<String>> {
    device_tokens::table
        .filter(device_tokens::user_id.eq_any(user_ids.to_vec()))
        .select(device_tokens::token)
        .load::<String>(conn)
}

/// A token belongs to whichever user registered it last.
pub fn register_token(
    conn: &mut PgConnection,
    user_id: Uuid,
    token: &str,
    platform: Option<&str>,
) -> AppResult<DeviceToken> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::new(ErrorCode::DeviceTokenRequired, "Token is required"));
    }

    let platform = platform
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PLATFORM)
        .to_lowercase();

    let row = diesel::insert_into(device_tokens::table)
        .values(&NewDeviceToken {
            user_id,
            token: token.to_string(),
            platform,
        })
        .on_conflict(device_tokens::token)
        .do_update()
        .set((
            device_tokens::user_id.eq(excluded(device_tokens::user_id)),
            device_tokens::platform.eq(excluded(device_tokens::platform)),
            device_tokens::updated_at.eq(Utc::now()),
        ))
        .get_result::<DeviceToken>(conn)?;

    tracing::info!(user_id = %user_id, platform = %row.platform, "device token registered");
    Ok(row)
}

/// Returns whether a row was removed. Only the owner's token is touched.
pub fn remove_token(conn: &mut PgConnection, user_id: Uuid, token: &str) -> AppResult<bool> {
    let deleted = diesel::delete(
        device_tokens::table
            .filter(device_tokens::user_id.eq(user_id))
            .filter(device_tokens::token.eq(token.trim())),
    )
    .execute(conn)?;

    Ok(deleted > 0)
}
