//! User JWT authentication middleware.
//!
//! Routes behind [`require_user_auth`] only run with a valid Bearer token;
//! the caller's identity is placed in request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use shared::jwt::{extract_user_id, JwtConfig, JwtError};

/// Authenticated user information extracted from JWT.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// User ID from the `uid` claim.
    pub user_id: Uuid,
    pub email: String,
    pub email_verified: bool,
    /// JWT ID (jti) for log correlation.
    pub jti: String,
}

impl UserAuth {
    /// Validates an access token and returns user authentication info.
    pub fn validate(jwt_config: &JwtConfig, token: &str) -> Result<Self, JwtError> {
        let claims = jwt_config.validate_token(token)?;
        let user_id = extract_user_id(&claims)?;

        Ok(UserAuth {
            user_id,
            email: claims.email,
            email_verified: claims.email_verified,
            jti: claims.jti,
        })
    }
}

/// Token part of an `Authorization: Bearer <token>` header value.
pub(crate) fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that requires JWT user authentication.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    let Some(token) = token else {
        return unauthorized_response("Missing or invalid Authorization header");
    };

    match UserAuth::validate(&state.jwt, token) {
        Ok(auth) => {
            tracing::debug!(user_id = %auth.user_id, jti = %auth.jti, "Request authenticated");
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("JWT validation failed: {}", e);
            unauthorized_response("Invalid or expired token")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::jwt::TokenSubject;

    fn jwt() -> JwtConfig {
        JwtConfig::new(
            "test-secret-key-that-is-at-least-32-bytes",
            "LifeGuard",
            "LifeGuardUser",
            60,
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }

    #[test]
    fn test_validate_round_trip_claims() {
        let config = jwt();
        let user_id = Uuid::new_v4();
        let roles = vec!["User".to_string()];
        let (token, jti) = config
            .generate_token(&TokenSubject {
                user_id,
                email: "jane@example.com",
                email_verified: true,
                roles: &roles,
            })
            .unwrap();

        let auth = UserAuth::validate(&config, &token).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.email, "jane@example.com");
        assert!(auth.email_verified);
        assert_eq!(auth.jti, jti);
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(UserAuth::validate(&jwt(), "not-a-token").is_err());
    }

    #[test]
    fn test_unauthorized_response() {
        let response = unauthorized_response("Invalid or expired token");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
