use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{domain}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Event errors
/// - E2xxx: Application errors
/// - E3xxx: Rating errors
/// - E4xxx: Chat errors
/// - E5xxx: Notification errors
/// - E6xxx: Verification errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    BadRequest,
    Conflict,
    TokenExpired,
    TokenInvalid,
    RoleNotAllowed,

    // Events (E1xxx)
    EventNotFound,
    EventNotCompleted,
    EventNotOpen,
    ApplicationDeadlinePassed,
    InvalidEventStatus,

    // Applications (E2xxx)
    ApplicationNotFound,
    AlreadyApplied,
    InvalidStatusTransition,
    InvalidCompensationStatus,

    // Ratings (E3xxx)
    CannotRateSelf,
    InvalidScore,
    InvalidRatee,
    NotEligibleToRate,
    AlreadyRated,

    // Chat (E4xxx)
    ThreadNotFound,
    MessageEmpty,
    MessageTooLong,
    NotEventOwner,

    // Notifications (E5xxx)
    DeviceTokenRequired,

    // Verification (E6xxx)
    VerificationRequestNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::BadRequest => "E0007",
            Self::Conflict => "E0008",
            Self::TokenExpired => "E0009",
            Self::TokenInvalid => "E0010",
            Self::RoleNotAllowed => "E0011",

            // Events
            Self::EventNotFound => "E1001",
            Self::EventNotCompleted => "E1002",
            Self::EventNotOpen => "E1003",
            Self::ApplicationDeadlinePassed => "E1004",
            Self::InvalidEventStatus => "E1005",

            // Applications
            Self::ApplicationNotFound => "E2001",
            Self::AlreadyApplied => "E2002",
            Self::InvalidStatusTransition => "E2003",
            Self::InvalidCompensationStatus => "E2004",

            // Ratings
            Self::CannotRateSelf => "E3001",
            Self::InvalidScore => "E3002",
            Self::InvalidRatee => "E3003",
            Self::NotEligibleToRate => "E3004",
            Self::AlreadyRated => "E3005",

            // Chat
            Self::ThreadNotFound => "E4001",
            Self::MessageEmpty => "E4002",
            Self::MessageTooLong => "E4003",
            Self::NotEventOwner => "E4004",

            // Notifications
            Self::DeviceTokenRequired => "E5001",

            // Verification
            Self::VerificationRequestNotFound => "E6001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::EventNotCompleted
            | Self::EventNotOpen | Self::ApplicationDeadlinePassed | Self::InvalidEventStatus
            | Self::InvalidCompensationStatus | Self::CannotRateSelf | Self::InvalidScore
            | Self::InvalidRatee | Self::MessageEmpty | Self::MessageTooLong
            | Self::DeviceTokenRequired => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::EventNotFound | Self::ApplicationNotFound
            | Self::ThreadNotFound | Self::VerificationRequestNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::RoleNotAllowed | Self::NotEligibleToRate
            | Self::NotEventOwner => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict | Self::AlreadyApplied | Self::InvalidStatusTransition
            | Self::AlreadyRated => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Structured context rendered under `error.details`.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            AppError::Known { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// The error code this error would be rendered with.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::InternalError,
        }
    }

    /// Maps a unique-index violation onto `code`, anything else stays a database error.
    pub fn from_insert(err: diesel::result::Error, code: ErrorCode, message: &str) -> Self {
        if is_unique_violation(&err) {
            Self::new(code, message)
        } else {
            Self::Database(err)
        }
    }

    /// Maps a foreign-key violation (the referenced row does not exist) onto `code`.
    pub fn from_reference(err: diesel::result::Error, code: ErrorCode, message: &str) -> Self {
        if matches!(err, diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) {
            Self::new(code, message)
        } else {
            Self::Database(err)
        }
    }
}

pub fn is_unique_violation(err: &diesel::result::Error) -> bool {
    matches!(
        err,
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
