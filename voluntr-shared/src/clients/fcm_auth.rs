use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are replaced before use.
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// The fields of a Google service-account JSON key that token minting needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &str) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AuthError::Key(format!("{path}: {e}")))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        serde_json::from_str(raw).map_err(|e| AuthError::Key(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid service account key: {0}")]
    Key(String),
    #[error("could not sign token assertion: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

/// OAuth access tokens for FCM, minted from a service-account key with the JWT-bearer grant
/// and reused until they near expiry.
pub struct TokenSource {
    key: ServiceAccountKey,
    signer: EncodingKey,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(key: ServiceAccountKey, http: Client) -> Result<Self, AuthError> {
        let signer =
            EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| AuthError::Key(e.to_string()))?;
        Ok(Self {
            key,
            signer,
            http,
            cached: Mutex::new(None),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.key.project_id
    }

    /// Concurrent callers wait on one refresh instead of each minting a token.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref().filter(|t| now < t.expires_at - REFRESH_MARGIN_SECS) {
            return Ok(token.value.clone());
        }

        let fresh = self.mint(now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    /// Drops the cached token; the next call mints a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn mint(&self, now: i64) -> Result<CachedToken, AuthError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: FCM_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signer)?;

        let res = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status: status.as_u16(), body });
        }

        let token: TokenResponse = res.json().await?;
        tracing::debug!(client = %self.key.client_email, expires_in = token.expires_in, "minted FCM access token");
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}
