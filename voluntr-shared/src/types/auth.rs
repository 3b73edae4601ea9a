use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Volunteer,
    Organiser,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Volunteer => "volunteer",
            UserRole::Organiser => "organiser",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "volunteer" => Ok(UserRole::Volunteer),
            "organiser" | "organizer" => Ok(UserRole::Organiser),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// JWT claims issued by the auth service. Only verification happens here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(user_id: Uuid, role: UserRole, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            role,
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        expired_at(self.exp, Utc::now().timestamp())
    }
}

/// A token is expired once `now` reaches its `exp` second.
pub fn expired_at(exp: i64, now: i64) -> bool {
    now >= exp
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    pub token_id: Uuid,
    pub expires_at: i64,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            token_id: claims.jti,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing() {
        assert_eq!("volunteer".parse::<UserRole>().unwrap(), UserRole::Volunteer);
        assert_eq!("Organiser".parse::<UserRole>().unwrap(), UserRole::Organiser);
        assert_eq!("organizer".parse::<UserRole>().unwrap(), UserRole::Organiser);
        assert!("moderator".parse::<UserRole>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&UserRole::Organiser).unwrap();
        assert_eq!(json, "\"organiser\"");
    }

    #[test]
    fn expiry_boundary() {
        assert!(!expired_at(100, 99));
        assert!(expired_at(100, 100));
        assert!(expired_at(100, 101));
    }

    #[test]
    fn fresh_claims_not_expired() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::Volunteer, 3600);
        assert!(!claims.is_expired());
        assert!(claims.exp > claims.iat);
    }
}
