pub mod handlers;

use uuid::Uuid;

use voluntr_shared::types::auth::{expired_at, Claims, UserRole};

/// Identity attached to a socket after a successful handshake.
#[derive(Debug, Clone)]
pub struct SocketSession {
    pub user_id: Uuid,
    pub role: UserRole,
    pub expires_at: i64,
}

impl SocketSession {
    pub fn is_expired_at(&self, now: i64) -> bool {
        expired_at(self.expires_at, now)
    }
}

impl From<Claims> for SocketSession {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            expires_at: claims.exp,
        }
    }
}

/// `auth.token` from the handshake payload, else `?token=` from the connect URI.
pub fn handshake_token(auth: Option<&serde_json::Value>, query: Option<&str>) -> Option<String> {
    let from_auth = auth
        .and_then(|a| a.get("token"))
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = from_auth {
        return Some(token.to_string());
    }

    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}
