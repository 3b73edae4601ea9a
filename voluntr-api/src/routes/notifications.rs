use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use voluntr_shared::clients::db::checkout;
use voluntr_shared::clients::push::PushMessage;
use voluntr_shared::errors::AppResult;
use voluntr_shared::middleware::{AdminUser, JsonBody};
use voluntr_shared::types::api::ApiResponse;
use voluntr_shared::types::auth::AuthUser;

use crate::models::DeviceToken;
use crate::services::notifications;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    #[serde(default)]
    pub token: String,
    pub platform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveTokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTestRequest {
    #[serde(alias = "user_id")]
    pub user_id: Uuid,
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub sent: usize,
    pub failed: usize,
}

/// POST /notifications/register-token
pub async fn register_token(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RegisterTokenRequest>,
) -> AppResult<Json<ApiResponse<DeviceToken>>> {
    let mut conn = checkout(&state.db)?;
    let row = notifications::register_token(&mut conn, auth_user.id, &body.token, body.platform.as_deref())?;
    Ok(Json(ApiResponse::ok(row)))
}

/// DELETE /notifications/register-token
pub async fn remove_token(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RemoveTokenRequest>,
) -> AppResult<Json<ApiResponse<RemovedResponse>>> {
    let mut conn = checkout(&state.db)?;
    let removed = notifications::remove_token(&mut conn, auth_user.id, &body.token)?;
    Ok(Json(ApiResponse::ok(RemovedResponse { removed })))
}

/// POST /notifications/send-test - delivers synchronously so the admin sees the outcome
pub async fn send_test(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<SendTestRequest>,
) -> AppResult<Json<ApiResponse<DeliveryResponse>>> {
    let message = PushMessage::new(
        body.title.unwrap_or_else(|| "Test notification".to_string()),
        body.body.unwrap_or_else(|| "Push delivery is working".to_string()),
    )
    .with_data("type", "test");

    let report = state.notifier.notify_users(&[body.user_id], &message).await?;
    tracing::info!(admin_id = %admin.id, user_id = %body.user_id, sent = report.sent, failed = report.failed, "test notification sent");

    Ok(Json(ApiResponse::ok(DeliveryResponse {
        sent: report.sent,
        failed: report.failed,
    })))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use voluntr_shared::types::auth::UserRole;

    use super::*;
    use crate::test_support::{bearer, offline_app};

    #[tokio::test]
    async fn send_test_is_admin_only() {
        let (app, _) = offline_app();
        let (_, token) = bearer(UserRole::Organiser);
        let body = serde_json::json!({ "userId": Uuid::new_v4() }).to_string();
        let response = app
            .oneshot(
                Request::post("/notifications/send-test")
                    .header("authorization", token)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
