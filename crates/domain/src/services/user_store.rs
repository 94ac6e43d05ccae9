//! User account storage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{NewUser, PasswordResetToken, ProfileUpdate, User};
use crate::services::store_error::StoreError;

/// Persistence for accounts, OTP secrets and password reset tokens.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by normalized e-mail.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Create a user. Fails with [`StoreError::Conflict`] if the e-mail is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn set_otp_secret(&self, id: Uuid, secret: &str) -> Result<(), StoreError>;

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), StoreError>;

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User, StoreError>;

    /// Store the hash of a newly issued reset token.
    async fn create_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Atomically redeem a reset token and replace the password hash.
    ///
    /// Returns `false` when no unused, unexpired token matches.
    async fn reset_password(
        &self,
        user_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct UserTables {
    users: HashMap<Uuid, User>,
    reset_tokens: Vec<PasswordResetToken>,
}

/// In-memory user store for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    tables: RwLock<UserTables>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            email_verified: false,
            otp_secret: new_user.otp_secret,
            role: new_user.role,
            age: None,
            gender: None,
            weight: None,
            height: None,
            phone_number: None,
            bio: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_otp_secret(&self, id: Uuid, secret: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.otp_secret = Some(secret.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.email_verified = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        update.apply_to(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        tables.reset_tokens.push(PasswordResetToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            used_at: None,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn reset_password(
        &self,
        user_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(token) = tables.reset_tokens.iter_mut().find(|t| {
            t.user_id == user_id && t.token_hash == token_hash && t.is_redeemable(now)
        }) else {
            return Ok(false);
        };
        token.used_at = Some(now);

        let user = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.password_hash = new_password_hash.to_string();
        user.updated_at = now;
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
