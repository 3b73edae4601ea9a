use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims, UserRole};

const DEFAULT_SECRET: &str = "development-secret-change-in-production";

/// Secret used by the extractors. The service exports its configured secret as `JWT_SECRET`.
pub fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_SECRET.to_string())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = decode_claims(&token, &jwt_secret())?;
        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "no token provided"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AppError::new(
            ErrorCode::Unauthorized,
            "authorization header must use Bearer scheme",
        )),
    }
}

/// Verify signature and expiry of an HS256 token.
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, "invalid token"),
    })?;

    if token_data.claims.is_expired() {
        return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
    }

    Ok(token_data.claims)
}

/// Declares an extractor that admits exactly one role and rejects the rest with `$code`.
macro_rules! role_gate {
    ($(#[$doc:meta])* $name:ident, $role:path, $code:path, $msg:literal) => {
        $(#[$doc])*
        pub struct $name(pub AuthUser);

        #[axum::async_trait]
        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
        {
            type Rejection = AppError;

            async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
                let user = AuthUser::from_request_parts(parts, state).await?;
                if user.role == $role {
                    Ok(Self(user))
                } else {
                    Err(AppError::new($code, $msg))
                }
            }
        }
    };
}

role_gate!(VolunteerUser, UserRole::Volunteer, ErrorCode::RoleNotAllowed, "volunteer access required");
role_gate!(
    /// Event owners. Ownership of a particular event is checked by the service layer.
    OrganiserUser,
    UserRole::Organiser,
    ErrorCode::RoleNotAllowed,
    "organiser access required"
);
role_gate!(AdminUser, UserRole::Admin, ErrorCode::Forbidden, "admin access required");
