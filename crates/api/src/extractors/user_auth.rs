//! User JWT authentication extractor.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::{bearer_token, UserAuth};

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already validated by require_user_auth
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        UserAuth::validate(&state.jwt, token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))
    }
}
