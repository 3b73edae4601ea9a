use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;

use super::fcm_auth::{AuthError, ServiceAccountKey, TokenSource};

pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";
/// Upper bound for one FCM or token-endpoint call.
pub const FCM_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload shown on the device. `data` values must be strings for FCM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushDelivery {
    pub token: String,
    pub message: PushMessage,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push provider rejected all {failed} tokens")]
    AllFailed { failed: usize },
    #[error("FCM authentication failed: {0}")]
    Auth(#[from] AuthError),
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
    data: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Clone)]
enum Backend {
    Fcm {
        client: Client,
        send_url: String,
        tokens: Arc<TokenSource>,
    },
    Disabled,
    Recording(Arc<Mutex<Vec<PushDelivery>>>),
}

/// Mobile push sender (FCM HTTP v1).
#[derive(Clone)]
pub struct PushClient {
    backend: Backend,
}

impl PushClient {
    /// FCM HTTP v1 authenticated as the service account in `key`.
    pub fn fcm(endpoint: &str, key: ServiceAccountKey) -> Result<Self, PushError> {
        let client = Client::builder()
            .timeout(FCM_REQUEST_TIMEOUT)
            .build()
            .map_err(AuthError::from)?;
        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            endpoint.trim_end_matches('/'),
            key.project_id
        );
        let tokens = TokenSource::new(key, client.clone())?;
        tracing::info!(url = %send_url, "push notifications enabled");
        Ok(Self {
            backend: Backend::Fcm {
                client,
                send_url,
                tokens: Arc::new(tokens),
            },
        })
    }

    pub fn disabled() -> Self {
        Self { backend: Backend::Disabled }
    }

    /// Keeps deliveries in memory instead of sending them; local development and tests.
    pub fn recording() -> Self {
        Self {
            backend: Backend::Recording(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, Backend::Disabled)
    }

    pub fn recorded(&self) -> Vec<PushDelivery> {
        match &self.backend {
            Backend::Recording(store) => store.lock().map(|s| s.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub async fn send_to_tokens(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<PushReport, PushError> {
        if tokens.is_empty() {
            return Ok(PushReport::default());
        }

        match &self.backend {
            Backend::Disabled => {
                tracing::warn!(tokens = tokens.len(), "push not configured, skipping notification");
                Ok(PushReport::default())
            }
            Backend::Recording(store) => {
                if let Ok(mut store) = store.lock() {
                    store.extend(tokens.iter().map(|token| PushDelivery {
                        token: token.clone(),
                        message: message.clone(),
                    }));
                }
                Ok(PushReport { sent: tokens.len(), failed: 0 })
            }
            Backend::Fcm { client, send_url, tokens: auth } => {
                let access_token = auth.access_token().await?;
                let mut report = PushReport::default();
                for token in tokens {
                    let request = FcmRequest {
                        message: FcmMessage {
                            token,
                            notification: FcmNotification {
                                title: &message.title,
                                body: &message.body,
                            },
                            data: &message.data,
                        },
                    };

                    let result = client
                        .post(send_url)
                        .bearer_auth(&access_token)
                        .json(&request)
                        .send()
                        .await;

                    match result {
                        Ok(res) if res.status().is_success() => report.sent += 1,
                        Ok(res) => {
                            report.failed += 1;
                            let status = res.status();
                            if status == StatusCode::UNAUTHORIZED {
                                auth.invalidate().await;
                            }
                            let body = res.text().await.unwrap_or_default();
                            tracing::warn!(status = %status, body = %body, "FCM rejected push");
                        }
                        Err(e) => {
                            report.failed += 1;
                            tracing::warn!(error = %e, "FCM request failed");
                        }
                    }
                }

                if report.sent == 0 {
                    return Err(PushError::AllFailed { failed: report.failed });
                }
                Ok(report)
            }
        }
    }
}
