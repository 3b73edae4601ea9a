pub mod admin;
pub mod applications;
pub mod chat;
pub mod events;
pub mod health;
pub mod notifications;
pub mod ratings;
