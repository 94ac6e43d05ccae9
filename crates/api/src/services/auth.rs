//! Account service: registration, login, OTP verification, password reset
//! and profile access.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use domain::models::{NewUser, Profile, ProfileUpdate, User};
use domain::services::{StoreError, UserStore};
use shared::crypto::{generate_secure_token, sha256_hex};
use shared::jwt::{JwtConfig, JwtError, TokenSubject};
use shared::otp::OtpError;
use shared::password::{check_strength, hash_password, verify_password, PasswordError};
use shared::validation::normalize_email;

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::middleware::metrics::record_otp_verification;
use crate::services::email::{EmailError, EmailService};
use crate::services::otp::OtpService;

/// Random bytes in a password reset token (hex encoded on the wire).
const RESET_TOKEN_BYTES: usize = 32;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found.")]
    UserNotFound,

    #[error("User not found or email not confirmed.")]
    ResetUnavailable,

    #[error("User does not have a secret key. Please request a new OTP.")]
    MissingOtpSecret,

    #[error("Invalid or expired OTP.")]
    InvalidOtp,

    #[error("Failed to send OTP email.")]
    OtpEmailFailed,

    #[error("Failed to send password reset email.")]
    ResetEmailFailed,

    #[error("New password and confirmation do not match.")]
    PasswordMismatch,

    #[error("User does not exist")]
    UnknownResetUser,

    #[error("Invalid or expired reset token.")]
    InvalidResetToken,

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Password error: {0}")]
    Password(PasswordError),

    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(msg) => AuthError::WeakPassword(msg),
            other => AuthError::Password(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::EmailAlreadyExists => ApiError::Conflict(message),
            AuthError::WeakPassword(_) => ApiError::Validation(message),
            AuthError::InvalidCredentials => ApiError::Unauthorized(message),
            AuthError::UserNotFound | AuthError::ResetUnavailable => ApiError::NotFound(message),
            AuthError::MissingOtpSecret
            | AuthError::InvalidOtp
            | AuthError::PasswordMismatch
            | AuthError::UnknownResetUser
            | AuthError::InvalidResetToken => ApiError::BadRequest(message),
            AuthError::OtpEmailFailed | AuthError::ResetEmailFailed => {
                ApiError::DeliveryFailed(message)
            }
            AuthError::Store(e) => ApiError::from(e),
            AuthError::Token(_) | AuthError::Password(_) | AuthError::Otp(_) => {
                ApiError::Internal(message)
            }
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub token: String,
    pub expires_in: i64,
}

/// Result of a registration. The account exists even when `otp_sent` is false.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user_id: Uuid,
    pub otp_sent: bool,
}

/// Public identity of a user.
#[derive(Debug, Clone)]
pub struct UserSummary {
    pub name: String,
    pub email: String,
}

/// Account service.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: Arc<JwtConfig>,
    otp: OtpService,
    email: EmailService,
    default_role: String,
    reset_token_expiry_hours: i64,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt: Arc<JwtConfig>,
        otp: OtpService,
        email: EmailService,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            jwt,
            otp,
            email,
            default_role: config.default_role.clone(),
            reset_token_expiry_hours: config.reset_token_expiry_hours,
        }
    }

    /// Create an unverified account and e-mail its first OTP.
    ///
    /// A failed e-mail send is logged and reported through
    /// [`Registration::otp_sent`]; the account is kept.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, AuthError> {
        let email = normalize_email(email);

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        check_strength(password)?;
        let password_hash = hash_password(password)?;
        let otp_secret = self.otp.generate_secret()?;

        let user = self
            .users
            .create(NewUser {
                name: name.trim().to_string(),
                email: email.clone(),
                password_hash,
                role: self.default_role.clone(),
                otp_secret: Some(otp_secret.clone()),
            })
            .await
            .map_err(|e| match e {
                // lost a race with a concurrent registration
                StoreError::Conflict(_) => AuthError::EmailAlreadyExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");

        let otp_sent = match self.otp.send_otp_email(&user.email, &otp_secret).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Registration OTP email failed");
                false
            }
        };

        Ok(Registration {
            user_id: user.id,
            otp_sent,
        })
    }

    /// Check credentials and issue an access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let roles = vec![user.role.clone()];
        let (token, jti) = self.jwt.generate_token(&TokenSubject {
            user_id: user.id,
            email: &user.email,
            email_verified: user.email_verified,
            roles: &roles,
        })?;

        tracing::info!(user_id = %user.id, jti = %jti, "User logged in");

        Ok(LoginResult {
            user_id: user.id,
            email: user.email,
            name: user.name,
            token,
            expires_in: self.jwt.expires_in_secs(),
        })
    }

    /// Send a new code, creating the user's secret if it has none.
    pub async fn resend_otp(&self, email: &str) -> Result<(), AuthError> {
        let user = self.require_user_by_email(email).await?;

        let secret = match user.otp_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                let secret = self.otp.generate_secret()?;
                self.users.set_otp_secret(user.id, &secret).await?;
                secret
            }
        };

        self.otp
            .send_otp_email(&user.email, &secret)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Failed to resend OTP");
                AuthError::OtpEmailFailed
            })
    }

    /// Check a submitted code and mark the e-mail address verified.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let user = self.require_user_by_email(email).await?;

        let secret = user
            .otp_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingOtpSecret)?;

        let valid = self.otp.validate(secret, code)?;
        record_otp_verification(valid);
        if !valid {
            return Err(AuthError::InvalidOtp);
        }

        self.users.mark_email_verified(user.id).await?;
        tracing::info!(user_id = %user.id, "Email verified by OTP");
        Ok(())
    }

    /// Issue a single-use reset token and e-mail the reset link.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let user = match self.users.find_by_email(&normalize_email(email)).await? {
            Some(user) if user.email_verified => user,
            _ => return Err(AuthError::ResetUnavailable),
        };

        let token = generate_secure_token(RESET_TOKEN_BYTES);
        let expires_at = Utc::now() + Duration::hours(self.reset_token_expiry_hours);
        self.users
            .create_reset_token(user.id, &sha256_hex(&token), expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "Password reset token generated");

        self.email
            .send_password_reset_email(
                &user.email,
                Some(&user.name),
                &token,
                self.reset_token_expiry_hours,
            )
            .await
            .map_err(|e: EmailError| {
                tracing::error!(user_id = %user.id, error = %e, "Failed to send reset email");
                AuthError::ResetEmailFailed
            })
    }

    /// Redeem a reset token and set the new password.
    pub async fn reset_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        if new_password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::UnknownResetUser)?;

        check_strength(new_password)?;
        let password_hash = hash_password(new_password)?;

        let redeemed = self
            .users
            .reset_password(user.id, &sha256_hex(token.trim()), &password_hash, Utc::now())
            .await?;
        if !redeemed {
            return Err(AuthError::InvalidResetToken);
        }

        tracing::info!(user_id = %user.id, "Password reset successfully");
        Ok(())
    }

    /// Name and e-mail of a user; ids that do not parse are simply unknown.
    pub async fn get_user_by_id(&self, id: &str) -> Result<UserSummary, AuthError> {
        let id = Uuid::parse_str(id.trim()).map_err(|_| AuthError::UserNotFound)?;
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(UserSummary {
            name: user.name,
            email: user.email,
        })
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(Profile::from(&user))
    }

    /// Apply a partial profile update and return the resulting profile.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Profile, AuthError> {
        if update.is_empty() {
            return self.get_profile(user_id).await;
        }

        let user = self
            .users
            .update_profile(user_id, update)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::UserNotFound,
                other => AuthError::Store(other),
            })?;
        tracing::info!(user_id = %user_id, "Profile updated");
        Ok(Profile::from(&user))
    }

    async fn require_user_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
