//! User account entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
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

impl From<UserEntity> for domain::models::User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            email: entity.email,
            password_hash: entity.password_hash,
            email_verified: entity.email_verified,
            otp_secret: entity.otp_secret,
            role: entity.role,
            age: entity.age,
            gender: entity.gender,
            weight: entity.weight,
            height: entity.height,
            phone_number: entity.phone_number,
            bio: entity.bio,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;

    #[test]
    fn test_user_entity_conversion() {
        let now = Utc::now();
        let entity = UserEntity {
            id: Uuid::new_v4(),
            name: Name().fake(),
            email: SafeEmail().fake(),
            password_hash: "$argon2id$stub".to_string(),
            email_verified: true,
            otp_secret: Some("c2VjcmV0".to_string()),
            role: "User".to_string(),
            age: Some(28),
            gender: Some("male".to_string()),
            weight: Some(75.0),
            height: None,
            phone_number: None,
            bio: None,
            created_at: now,
            updated_at: now,
        };

        let user: domain::models::User = entity.clone().into();
        assert_eq!(user.id, entity.id);
        assert_eq!(user.email, entity.email);
        assert!(user.email_verified);
        assert_eq!(user.otp_secret.as_deref(), Some("c2VjcmV0"));
        assert_eq!(user.age, Some(28));
        assert_eq!(user.weight, Some(75.0));
    }
}
