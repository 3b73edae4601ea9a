pub mod applications;
pub mod chat;
pub mod events;
pub mod lifecycle;
pub mod notifications;
pub mod rate_limiter;
pub mod ratings;
pub mod verification;
