//! Database repositories.

#![allow(missing_docs)]

pub mod account;
pub mod notification;
pub mod organization;

pub use account::{AccountRepository, RoleStatusCount};
pub use notification::NotificationRepository;
pub use organization::{KindStatusCount, OrganizationRepository};

use placement_common::AppError;
use sea_orm::{DbErr, SqlErr};

const UNIQUE_VIOLATION: &str = "duplicate key value violates unique constraint";

/// Map an insert failure, reporting a lost uniqueness race as a conflict.
pub(crate) fn insert_error(err: DbErr) -> AppError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return AppError::Conflict(detail);
    }
    let message = err.to_string();
    if message.contains(UNIQUE_VIOLATION) {
        AppError::Conflict(message)
    } else {
        AppError::Database(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = DbErr::Query(RuntimeErr::Internal(
            "duplicate key value violates unique constraint \"account_email_key\"".to_string(),
        ));
        assert!(matches!(insert_error(err), AppError::Conflict(_)));
    }

    #[test]
    fn test_other_failures_stay_database_errors() {
        let err = DbErr::Query(RuntimeErr::Internal("connection reset".to_string()));
        assert!(matches!(insert_error(err), AppError::Database(_)));
    }
}
