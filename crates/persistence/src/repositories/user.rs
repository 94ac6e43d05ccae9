//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{NewUser, ProfileUpdate, User};
use domain::services::{StoreError, UserStore};

use super::to_store_error;
use crate::entities::{PasswordResetTokenEntity, UserEntity};
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "id, name, email, password_hash, email_verified, otp_secret, role, \
     age, gender, weight, height, phone_number, bio, created_at, updated_at";

/// Repository for user-related database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Find a user by email address.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Create a new, unverified user account.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, email_verified, otp_secret, role)
            VALUES ($1, $2, $3, false, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.otp_secret)
        .bind(&new_user.role)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Replace the user's OTP secret.
    pub async fn update_otp_secret(&self, id: Uuid, secret: &str) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("update_user_otp_secret");
        let result = sqlx::query(
            r#"
            UPDATE users
            SET otp_secret = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(secret)
        .bind(id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Mark the user's email address as verified.
    pub async fn set_email_verified(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("set_user_email_verified");
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = true, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Update the present profile fields, leaving the others untouched.
    pub async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_user_profile");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET age = COALESCE($2, age),
                gender = COALESCE($3, gender),
                weight = COALESCE($4, weight),
                height = COALESCE($5, height),
                phone_number = COALESCE($6, phone_number),
                bio = COALESCE($7, bio),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.age)
        .bind(&update.gender)
        .bind(update.weight)
        .bind(update.height)
        .bind(&update.phone_number)
        .bind(&update.bio)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Store the hash of a password reset token.
    pub async fn insert_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetTokenEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_password_reset_token");
        let result = sqlx::query_as::<_, PasswordResetTokenEntity>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, used_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Consume a reset token and set the new password hash in one transaction.
    ///
    /// Returns the consumed token, or `None` if no redeemable token matched.
    pub async fn redeem_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetTokenEntity>, sqlx::Error> {
        let timer = QueryTimer::new("redeem_password_reset_token");

        let mut tx = self.pool.begin().await?;

        let token = sqlx::query_as::<_, PasswordResetTokenEntity>(
            r#"
            UPDATE password_reset_tokens
            SET used_at = $3
            WHERE user_id = $1 AND token_hash = $2 AND used_at IS NULL AND expires_at > $3
            RETURNING id, user_id, token_hash, expires_at, used_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if token.is_none() {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(new_password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(token)
    }
}

#[async_trait::async_trait]
impl UserStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepository::find_by_email(self, email)
            .await
            .map_err(to_store_error)?
            .map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(UserRepository::find_by_id(self, id)
            .await
            .map_err(to_store_error)?
            .map(Into::into))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        self.create_user(&new_user)
            .await
            .map(Into::into)
            .map_err(to_store_error)
    }

    async fn set_otp_secret(&self, id: Uuid, secret: &str) -> Result<(), StoreError> {
        match self.update_otp_secret(id, secret).await.map_err(to_store_error)? {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), StoreError> {
        match self.set_email_verified(id).await.map_err(to_store_error)? {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User, StoreError> {
        UserRepository::update_profile(self, id, update)
            .await
            .map_err(to_store_error)?
            .map(Into::into)
            .ok_or(StoreError::NotFound)
    }

    async fn create_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let token = self
            .insert_reset_token(user_id, token_hash, expires_at)
            .await
            .map_err(to_store_error)?;
        tracing::debug!(token_id = %token.id, user_id = %user_id, "Password reset token stored");
        Ok(())
    }

    async fn reset_password(
        &self,
        user_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let token = self
            .redeem_reset_token(user_id, token_hash, new_password_hash, now)
            .await
            .map_err(to_store_error)?;
        Ok(token.is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let timer = QueryTimer::new("ping");
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        timer.finish(&result);
        result.map(|_| ()).map_err(to_store_error)
    }
}
