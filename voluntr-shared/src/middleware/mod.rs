//! Request-side plumbing shared by the API binary: JWT and body extractors, logging and Prometheus wiring.

mod auth_extractor;
mod metrics_layer;
mod request_extractor;
mod tracing_layer;

pub use auth_extractor::{decode_claims, jwt_secret, AdminUser, OrganiserUser, VolunteerUser};
pub use metrics_layer::{
    init_metrics, metrics_middleware, CHAT_MESSAGES_SENT, CHAT_RATE_LIMITED, HTTP_DURATION, HTTP_REQUESTS,
    PUSH_NOTIFICATIONS,
};
pub use request_extractor::{JsonBody, PathParam, QueryParams};
pub use tracing_layer::{init_tracing, LogFormat};
