//! Repository implementations for database operations.
//!
//! Each repository exposes inherent query methods over entities and
//! implements the matching domain storage trait on top of them.

pub mod health_report;
pub mod user;

pub use health_report::HealthReportRepository;
pub use user::UserRepository;

use domain::services::StoreError;

/// Maps a sqlx error onto the domain storage error.
pub(crate) fn to_store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            StoreError::Conflict(db_err.message().to_string())
        }
        other => {
            tracing::error!(error = %other, "Database error");
            StoreError::Backend(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            to_store_error(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }

    #[test]
    fn test_other_errors_map_to_backend() {
        assert!(matches!(
            to_store_error(sqlx::Error::PoolTimedOut),
            StoreError::Backend(_)
        ));
    }
}
