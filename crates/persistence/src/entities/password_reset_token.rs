//! Password reset token entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the password_reset_tokens table.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetTokenEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PasswordResetTokenEntity> for domain::models::PasswordResetToken {
    fn from(entity: PasswordResetTokenEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            token_hash: entity.token_hash,
            expires_at: entity.expires_at,
            used_at: entity.used_at,
            created_at: entity.created_at,
        }
    }
}
