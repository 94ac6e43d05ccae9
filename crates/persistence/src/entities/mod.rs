//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod health_report;
pub mod password_reset_token;
pub mod user;

pub use health_report::HealthReportEntity;
pub use password_reset_token::PasswordResetTokenEntity;
pub use user::UserEntity;
