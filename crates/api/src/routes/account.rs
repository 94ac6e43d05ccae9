//! Account routes: registration, login, OTP verification and password reset.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::app::AppState;
use crate::error::{ApiError, MessageResponse};
use crate::extractors::{ApiJson, ApiQuery};

/// Request body for user registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength is checked by the account service
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub id: String,
    pub token: String,
    pub email: String,
    pub user_name: String,
    pub expires_in: i64,
}

/// Body carrying only an e-mail address.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 16, message = "OTP is required"))]
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,

    #[validate(length(min = 1, message = "Password confirmation is required"))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserIdQuery {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryResponse {
    pub user_name: String,
    pub email: String,
}

/// Register a new user and e-mail a verification code.
///
/// POST /api/Account/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    request.validate()?;

    let registration = state
        .auth
        .register(&request.name, &request.email, &request.password)
        .await?;

    let message = if registration.otp_sent {
        "Registration successful. Please check your email for the OTP."
    } else {
        "Registration successful, but the OTP email could not be sent. Please request a new OTP."
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: registration.user_id.to_string(),
            message: message.to_string(),
        }),
    ))
}

/// Authenticate with e-mail and password.
///
/// POST /api/Account/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    request.validate()?;

    let result = state.auth.login(&request.email, &request.password).await?;

    Ok(Json(LoginResponse {
        id: result.user_id.to_string(),
        token: result.token,
        email: result.email,
        user_name: result.name,
        expires_in: result.expires_in,
    }))
}

/// POST /api/Account/ResendOTP
pub async fn resend_otp(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state.auth.resend_otp(&request.email).await?;
    Ok(Json(MessageResponse::ok("OTP has been resent successfully.")))
}

/// POST /api/Account/VerifyOTP
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state.auth.verify_otp(&request.email, &request.otp).await?;
    Ok(Json(MessageResponse::ok("OTP verification successful.")))
}

/// POST /api/Account/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state.auth.forgot_password(&request.email).await?;
    Ok(Json(MessageResponse::ok("Password reset email sent")))
}

/// POST /api/Account/ResetPassword
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state
        .auth
        .reset_password(
            &request.email,
            &request.token,
            &request.new_password,
            &request.confirm_password,
        )
        .await?;
    Ok(Json(MessageResponse::ok("Password Reset Successfully")))
}

/// GET /api/Account/id?id=<uuid>
pub async fn get_user_by_id(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserIdQuery>,
) -> Result<Json<UserSummaryResponse>, ApiError> {
    let user = state.auth.get_user_by_id(&query.id).await?;
    Ok(Json(UserSummaryResponse {
        user_name: user.name,
        email: user.email,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let request = RegisterRequest {
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            password: "Guardian42".to_string(),
        };
        assert!(request.validate().is_ok());

        let request = RegisterRequest {
            name: String::new(),
            email: "not-an-email".to_string(),
            password: "Guardian42".to_string(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_reset_request_deserializes_camel_case() {
        let request: ResetPasswordRequest = serde_json::from_str(
            r#"{"email": "jane@example.com", "token": "abc",
                "newPassword": "Guardian42", "confirmPassword": "Guardian42"}"#,
        )
        .unwrap();
        assert_eq!(request.new_password, request.confirm_password);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_login_response_shape() {
        let response = LoginResponse {
            id: "id".to_string(),
            token: "t".to_string(),
            email: "jane@example.com".to_string(),
            user_name: "Jane".to_string(),
            expires_in: 3600,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["userName"], "Jane");
        assert_eq!(json["expiresIn"], 3600);
    }

    #[test]
    fn test_verify_request_requires_code() {
        let request = VerifyOtpRequest {
            email: "jane@example.com".to_string(),
            otp: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
