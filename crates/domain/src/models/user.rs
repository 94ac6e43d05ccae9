//! User account domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents a user account in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)] // Never serialize password hash to API responses
    pub password_hash: String,
    pub email_verified: bool,
    /// Base64-encoded TOTP shared secret
    #[serde(skip_serializing)]
    pub otp_secret: Option<String>,
    pub role: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub otp_secret: Option<String>,
}

/// Profile fields of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            age: user.age,
            gender: user.gender.clone(),
            weight: user.weight,
            height: user.height,
            phone_number: user.phone_number.clone(),
            bio: user.bio.clone(),
        }
    }
}

/// Partial profile update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150"))]
    pub age: Option<i32>,

    #[validate(length(max = 32, message = "Gender must be at most 32 characters"))]
    pub gender: Option<String>,

    #[validate(range(min = 0.0, max = 700.0, message = "Weight must be between 0 and 700 kg"))]
    pub weight: Option<f64>,

    #[validate(range(min = 0.0, max = 300.0, message = "Height must be between 0 and 300 cm"))]
    pub height: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_phone_number"))]
    pub phone_number: Option<String>,

    #[validate(length(max = 1000, message = "Bio must be at most 1000 characters"))]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.gender.is_none()
            && self.weight.is_none()
            && self.height.is_none()
            && self.phone_number.is_none()
            && self.bio.is_none()
    }

    /// Applies the present fields to `user`.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(age) = self.age {
            user.age = Some(age);
        }
        if let Some(gender) = &self.gender {
            user.gender = Some(gender.clone());
        }
        if let Some(weight) = self.weight {
            user.weight = Some(weight);
        }
        if let Some(height) = self.height {
            user.height = Some(height);
        }
        if let Some(phone_number) = &self.phone_number {
            user.phone_number = Some(phone_number.clone());
        }
        if let Some(bio) = &self.bio {
            user.bio = Some(bio.clone());
        }
    }
}

/// A single-use password reset token. Only the SHA-256 hash is stored.
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Whether the token can still be redeemed at `now`.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}
