use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }

    /// 201 response for handlers that insert a row.
    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Json(Self::ok(data)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

/// Body of `GET /health`. Any failed dependency makes the service unhealthy.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub checks: Vec<DependencyCheck>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyCheck {
    pub fn new<E: std::fmt::Display>(name: &str, result: Result<(), E>) -> Self {
        Self {
            name: name.to_owned(),
            ok: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        }
    }
}

impl HealthReport {
    pub fn new(service: impl Into<String>, version: impl Into<String>, checks: Vec<DependencyCheck>) -> Self {
        let status = if checks.iter().all(|c| c.ok) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        Self {
            status,
            service: service.into(),
            version: version.into(),
            checks,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_skips_empty_message() {
        let json = serde_json::to_value(ApiResponse::ok(serde_json::json!({ "applied": false }))).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["applied"], false);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn one_failed_dependency_fails_the_report() {
        let checks = vec![
            DependencyCheck::new::<String>("database", Ok(())),
            DependencyCheck::new("redis", Err("connection refused")),
        ];
        let report = HealthReport::new("voluntr-api", "0.1.0", checks);
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.http_status(), StatusCode::SERVICE_UNAVAILABLE);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["checks"][0]["ok"], true);
        assert!(json["checks"][0].get("error").is_none());
        assert_eq!(json["checks"][1]["error"], "connection refused");
    }

    #[test]
    fn no_checks_is_healthy() {
        let report = HealthReport::new("voluntr-api", "0.1.0", Vec::new());
        assert_eq!(report.http_status(), StatusCode::OK);
    }
}
