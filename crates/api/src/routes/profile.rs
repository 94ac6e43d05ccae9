//! Profile routes for the authenticated user.

use axum::{extract::State, Json};
use validator::Validate;

use domain::models::{Profile, ProfileUpdate};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ApiJson;
use crate::middleware::UserAuth;

/// GET /api/Profile
pub async fn get_profile(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.auth.get_profile(auth.user_id).await?;
    Ok(Json(profile))
}

/// Update any subset of the profile fields.
///
/// PUT /api/Profile
pub async fn update_profile(
    State(state): State<AppState>,
    auth: UserAuth,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    update.validate()?;
    let profile = state.auth.update_profile(auth.user_id, &update).await?;
    Ok(Json(profile))
}
