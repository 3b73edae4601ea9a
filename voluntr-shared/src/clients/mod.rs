pub mod db;
pub mod fcm_auth;
pub mod push;
pub mod redis;
