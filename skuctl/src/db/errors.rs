//! Database error taxonomy shared by all repositories.

use thiserror::Error;

/// Unified error type for repository operations.
///
/// Reads distinguish "no matching row" from I/O failures; writes that must
/// touch exactly one row report zero affected rows as an error instead of a
/// silent no-op.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("order not found")]
    OrderNotFound,

    #[error("order item not found")]
    OrderItemNotFound,

    #[error("issuer not found")]
    IssuerNotFound,

    /// An orders update matched zero rows.
    #[error("no rows changed in orders")]
    NoRowsChangedOrder,

    /// Submission dedup was asked to run over an empty credential batch.
    #[error("invalid number of credentials")]
    InvalidCredentialCount,

    /// Unique constraint violation
    #[error("unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("foreign key constraint violation")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    DbError::UniqueViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
