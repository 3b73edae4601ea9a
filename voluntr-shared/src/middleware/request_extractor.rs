use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use serde_json::json;

use crate::errors::{AppError, ErrorCode};

/// JSON request body. Malformed or incomplete bodies become `ValidationError` envelopes.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::MissingJsonContentType(_) => "expected an application/json body".to_string(),
            JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON".to_string(),
            _ => describe_body_error(&rejection.body_text()),
        };
        AppError::new(ErrorCode::ValidationError, message)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => AppError::with_details(
                ErrorCode::ValidationError,
                "invalid path parameter",
                json!({ "reason": e.body_text() }),
            ),
            other => {
                tracing::error!(error = %other.body_text(), "route is missing its path parameters");
                AppError::internal("internal server error")
            }
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::with_details(
            ErrorCode::ValidationError,
            "invalid query parameters",
            json!({ "reason": rejection.body_text() }),
        )
    }
}

/// `missing field `eventId`` reads as "eventId is required"; other serde causes pass through
/// without axum's preamble.
fn describe_body_error(text: &str) -> String {
    if let Some(field) = text
        .split_once("missing field `")
        .and_then(|(_, rest)| rest.split_once('`'))
        .map(|(field, _)| field)
    {
        return format!("{field} is required");
    }
    match text.split_once(": ") {
        Some((_, cause)) => cause.to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_field() {
        let text = "Failed to deserialize the JSON body into the target type: missing field `eventId` at line 1 column 2";
        assert_eq!(describe_body_error(text), "eventId is required");
    }

    #[test]
    fn other_causes_drop_the_preamble() {
        let text = "Failed to deserialize the JSON body into the target type: score: invalid type: string \"x\", expected i32 at line 1 column 12";
        assert_eq!(
            describe_body_error(text),
            "score: invalid type: string \"x\", expected i32 at line 1 column 12"
        );
        assert_eq!(describe_body_error("plain"), "plain");
    }
}
