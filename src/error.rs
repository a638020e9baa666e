//! Error Types
//!
//! Two layers:
//! - [`StoreError`]: what a store implementation reports to the core. Carries
//!   a dedicated [`StoreError::WriteConflict`] so the transfer retry loop can
//!   tell a retryable store conflict from a logical failure.
//! - [`AppError`]: what the core reports to its callers. Each variant maps to a
//!   stable error code and an HTTP status suggestion.

use thiserror::Error;

/// SQLSTATE codes the stores classify.
pub mod sqlstate {
    pub const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
}

// ============================================================================
// Store Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: i64 },

    /// Concurrent units of work interfered; the unit must be retried.
    #[error("write conflict: {0}")]
    WriteConflict(String),

    /// A value did not fit its column.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a driver error, promoting serialization failures and
    /// detected deadlocks to [`StoreError::WriteConflict`] and numeric
    /// overflow to [`StoreError::OutOfRange`].
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());
        match code.as_deref() {
            Some(sqlstate::SERIALIZATION_FAILURE) | Some(sqlstate::DEADLOCK_DETECTED) => {
                StoreError::WriteConflict(err.to_string())
            }
            Some(sqlstate::NUMERIC_VALUE_OUT_OF_RANGE) => StoreError::OutOfRange(err.to_string()),
            _ => StoreError::Database(err),
        }
    }

    /// Like [`StoreError::from_sqlx`], but a unique violation becomes
    /// [`StoreError::Duplicate`] for the given entity.
    pub fn from_sqlx_insert(err: sqlx::Error, entity: &'static str, id: i64) -> Self {
        let is_unique = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|c| c == sqlstate::UNIQUE_VIOLATION);
        if is_unique {
            StoreError::Duplicate { entity, id }
        } else {
            StoreError::from_sqlx(err)
        }
    }

    #[inline]
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, StoreError::WriteConflict(_))
    }
}

// ============================================================================
// Application Errors
// ============================================================================

/// Reported when a balance would not fit the balance column.
pub const BALANCE_LIMIT_MESSAGE: &str = "Amount exceeds the maximum supported account balance";

/// Error kinds surfaced by the account and transfer orchestrators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed or out-of-range input. Never retried.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found. Please check the ID and try again")]
    NotFound { entity: &'static str, id: i64 },

    #[error("This {entity} already exists in the system")]
    Conflict { entity: &'static str, id: i64 },

    #[error("Insufficient funds. Please check your account balance and try again")]
    InsufficientBalance { account_id: i64 },

    /// Write-conflict retries exhausted or deadline expired. Retryable later.
    #[error(
        "Unable to complete transfer due to high system load. Please try again in a few moments"
    )]
    Overloaded,

    /// Unexpected store failure; the text is for logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Wrap an unclassified failure with the operation that produced it.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        AppError::Internal(format!("{}: {}", context, err))
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::Overloaded => "SERVICE_OVERLOADED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::InsufficientBalance { .. } => 422,
            AppError::Overloaded => 503,
            AppError::Internal(_) => 500,
        }
    }

    /// Message safe to show to clients. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Overloaded)
    }
}

impl AppError {
    /// Convert a store failure, naming the operation for unclassified errors.
    pub fn from_store(context: &str, e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => {
                tracing::error!(context, error = %e, "store operation failed");
                AppError::internal(context, e)
            }
            other => other.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => AppError::NotFound { entity, id },
            StoreError::Duplicate { entity, id } => AppError::Conflict { entity, id },
            StoreError::WriteConflict(_) => AppError::Overloaded,
            StoreError::OutOfRange(_) => AppError::validation(BALANCE_LIMIT_MESSAGE),
            StoreError::Database(e) => AppError::internal("store", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(
            AppError::InsufficientBalance { account_id: 1 }.code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(AppError::Overloaded.code(), "SERVICE_OVERLOADED");
        assert_eq!(AppError::Internal("boom".into()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(AppError::validation("x").http_status(), 400);
        assert_eq!(
            AppError::NotFound {
                entity: "account",
                id: 9
            }
            .http_status(),
            404
        );
        assert_eq!(
            AppError::Conflict {
                entity: "account",
                id: 9
            }
            .http_status(),
            409
        );
        assert_eq!(
            AppError::InsufficientBalance { account_id: 1 }.http_status(),
            422
        );
        assert_eq!(AppError::Overloaded.http_status(), 503);
        assert_eq!(AppError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = AppError::internal("locking account", "connection reset by peer");
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.to_string().contains("locking account"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_business_messages_are_descriptive() {
        let err = AppError::NotFound {
            entity: "account",
            id: 999,
        };
        assert_eq!(
            err.public_message(),
            "account not found. Please check the ID and try again"
        );
        let err = AppError::Conflict {
            entity: "account",
            id: 1,
        };
        assert_eq!(err.public_message(), "This account already exists in the system");
    }

    #[test]
    fn test_only_overloaded_is_retryable() {
        assert!(AppError::Overloaded.is_retryable());
        assert!(!AppError::InsufficientBalance { account_id: 1 }.is_retryable());
        assert!(!AppError::validation("x").is_retryable());
    }

    #[test]
    fn test_store_error_mapping() {
        let e: AppError = StoreError::NotFound {
            entity: "account",
            id: 3,
        }
        .into();
        assert!(matches!(e, AppError::NotFound { id: 3, .. }));

        let e: AppError = StoreError::Duplicate {
            entity: "account",
            id: 3,
        }
        .into();
        assert!(matches!(e, AppError::Conflict { id: 3, .. }));

        let e: AppError = StoreError::WriteConflict("40001".into()).into();
        assert_eq!(e, AppError::Overloaded);

        let e: AppError = StoreError::OutOfRange("numeric field overflow".into()).into();
        assert_eq!(e, AppError::validation(BALANCE_LIMIT_MESSAGE));
        assert_eq!(e.http_status(), 400);

        let e: AppError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(e.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_from_store_keeps_context() {
        let e = AppError::from_store("reading account", StoreError::Database(sqlx::Error::PoolTimedOut));
        match e {
            AppError::Internal(msg) => assert!(msg.starts_with("reading account")),
            other => panic!("unexpected {:?}", other),
        }
        let e = AppError::from_store(
            "reading account",
            StoreError::NotFound {
                entity: "account",
                id: 5,
            },
        );
        assert!(matches!(e, AppError::NotFound { id: 5, .. }));
    }

    #[test]
    fn test_non_database_sqlx_error_is_not_a_conflict() {
        let e = StoreError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(!e.is_write_conflict());
        let e = StoreError::from_sqlx_insert(sqlx::Error::PoolClosed, "account", 1);
        assert!(matches!(e, StoreError::Database(_)));
    }
}
