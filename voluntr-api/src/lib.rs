use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use socketioxide::layer::SocketIoLayer;
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use voluntr_shared::clients::db::DbPool;
use voluntr_shared::middleware::metrics_middleware;

pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod socket;

use config::AppConfig;
use services::notifications::Notifier;
use services::rate_limiter::RateLimiter;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub io: SocketIo,
    pub notifier: Notifier,
    pub rate_limiter: RateLimiter,
    /// Absent when another recorder already owns the process (tests).
    pub metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

/// Registers the Socket.IO namespace on `state.io`.
pub fn attach_socket_handlers(state: Arc<AppState>) {
    let io = state.io.clone();
    io.ns("/", {
        let state = state.clone();
        move |socket: socketioxide::extract::SocketRef,
              socketioxide::extract::TryData::<serde_json::Value>(auth)| {
            let state = state.clone();
            async move {
                socket::handlers::on_connect(socket, auth.ok(), state).await;
            }
        }
    });
}

pub fn router(state: Arc<AppState>, sio_layer: SocketIoLayer) -> Router {
    Router::new()
        // Ops
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        // Events
        .route("/events", get(routes::events::list_events).post(routes::events::create_event))
        .route("/events/my-events", get(routes::events::my_events))
        .route("/events/:id", get(routes::events::get_event).put(routes::events::update_event))
        // Applications
        .route("/events/:id/apply", post(routes::applications::apply))
        .route("/events/:id/application-status", get(routes::applications::application_status))
        .route("/events/:id/applications", get(routes::applications::event_applications))
        .route("/applications/my", get(routes::applications::my_applications))
        .route("/applications/:id", get(routes::applications::get_application))
        .route("/applications/:id/status", put(routes::applications::update_status))
        .route("/applications/:id/compensation", put(routes::applications::update_compensation))
        .route("/applications/:id/cancel", put(routes::applications::cancel_application))
        // Ratings
        .route("/ratings", post(routes::ratings::give_rating))
        .route("/ratings/check", get(routes::ratings::check_rating))
        .route("/ratings/:id", get(routes::ratings::ratings_for_user))
        .route("/ratings/:id/summary", get(routes::ratings::rating_summary))
        // Chat
        .route("/chat/thread", post(routes::chat::get_or_create_thread))
        .route("/chat/threads", get(routes::chat::list_threads))
        .route(
            "/chat/thread/:thread_id/messages",
            get(routes::chat::get_messages).post(routes::chat::send_message),
        )
        // Notifications
        .route(
            "/notifications/register-token",
            post(routes::notifications::register_token).delete(routes::notifications::remove_token),
        )
        .route("/notifications/send-test", post(routes::notifications::send_test))
        // Admin
        .route("/admin/events/:id", delete(routes::admin::delete_event))
        .route("/admin/events/:id/complete-applications", post(routes::admin::complete_applications))
        .route("/admin/applications/:id/cancel", put(routes::admin::cancel_application))
        .route("/admin/verification-requests", get(routes::admin::verification_requests))
        .route("/admin/verification/approve", post(routes::admin::approve_verification))
        .route("/admin/verification/reject", post(routes::admin::reject_verification))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
