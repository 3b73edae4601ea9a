use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use voluntr_shared::clients::db;
use voluntr_shared::{DependencyCheck, HealthReport};

use crate::config::RateLimitBackend;
use crate::AppState;

/// Probes the database, and Redis when it backs the chat rate limiter.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let pool = state.db.clone();
    let db_result = tokio::task::spawn_blocking(move || db::ping(&pool))
        .await
        .unwrap_or_else(|e| Err(e.to_string()));

    let mut checks = vec![DependencyCheck::new("database", db_result)];

    if state.config.rate_limit_backend == RateLimitBackend::Redis {
        let redis_result = match state.rate_limiter.redis_client() {
            Some(client) => client.ping().await.map_err(|e| e.to_string()),
            None => Err("redis limiter not configured".to_string()),
        };
        checks.push(DependencyCheck::new("redis", redis_result));
    }

    let report = HealthReport::new("voluntr-api", env!("CARGO_PKG_VERSION"), checks);
    (report.http_status(), Json(report)).into_response()
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
