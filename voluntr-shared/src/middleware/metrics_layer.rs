use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const HTTP_REQUESTS: &str = "http_requests_total";
pub const HTTP_DURATION: &str = "http_request_duration_seconds";
pub const CHAT_MESSAGES_SENT: &str = "chat_messages_sent_total";
pub const CHAT_RATE_LIMITED: &str = "chat_rate_limited_total";
pub const PUSH_NOTIFICATIONS: &str = "push_notifications_total";

/// Probe and scrape routes are not recorded.
const UNTRACKED_ROUTES: [&str; 2] = ["/health", "/metrics"];

pub async fn metrics_middleware(matched_path: Option<MatchedPath>, req: Request<Body>, next: Next) -> Response {
    // Route templates only, never raw ids.
    let route = match matched_path {
        Some(p) if UNTRACKED_ROUTES.contains(&p.as_str()) => return next.run(req).await,
        Some(p) => p.as_str().to_owned(),
        None => "unmatched".to_owned(),
    };
    let method = req.method().as_str().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("route", route),
        ("status", response.status().as_u16().to_string()),
    ];
    counter!(HTTP_REQUESTS, &labels).increment(1);
    histogram!(HTTP_DURATION, &labels).record(started.elapsed().as_secs_f64());

    response
}

/// Installs the global Prometheus recorder and registers help text for every series the API emits.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;

    describe_counter!(HTTP_REQUESTS, Unit::Count, "HTTP requests by route and status");
    describe_histogram!(HTTP_DURATION, Unit::Seconds, "HTTP request latency");
    describe_counter!(CHAT_MESSAGES_SENT, Unit::Count, "Chat messages stored, by channel");
    describe_counter!(CHAT_RATE_LIMITED, Unit::Count, "Socket sends rejected by the per-user budget");
    describe_counter!(PUSH_NOTIFICATIONS, Unit::Count, "Push deliveries by outcome");

    Ok(handle)
}
