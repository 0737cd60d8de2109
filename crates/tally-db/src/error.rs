//! # Database Errors
//!
//! ```text
//! sqlx::Error ──► DbError (this module) ──► EngineError (tally-engine)
//!                                            ├── NotFound     ← DbError::NotFound
//!                                            └── Persistence  ← everything else
//! ```
//!
//! SQLite reports constraint failures only through the message text, so
//! [`From<sqlx::Error>`] sorts them into typed variants here and callers can
//! match on `ForeignKeyViolation` instead of parsing strings.

use tally_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// No row with that id (user, product, sale, staged pair).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A sale or pair pointing at a user / product / sale that isn't there.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A column CHECK failed, e.g. a pair with quantity 0.
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// A `TALLY_DB_*` setting that doesn't parse.
    #[error("Invalid value for {0}")]
    InvalidConfig(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Every pooled connection is busy and the acquire timed out.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Stored rows that break a domain rule, such as pairs whose total
    /// overflows.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Sorts a SQLite error message into a constraint variant.
fn classify_constraint(message: &str) -> DbError {
    const UNIQUE: &str = "UNIQUE constraint failed: ";

    if let Some(column) = message.strip_prefix(UNIQUE) {
        DbError::UniqueViolation {
            field: column.to_string(),
            value: "unknown".to_string(),
        }
    } else if message.starts_with("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation {
            message: message.to_string(),
        }
    } else if message.starts_with("CHECK constraint failed") {
        DbError::CheckViolation {
            message: message.to_string(),
        }
    } else {
        DbError::QueryFailed(message.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => classify_constraint(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::InvalidData(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            DbError::not_found("Sale", "s-1").to_string(),
            "Sale not found: s-1"
        );
    }

    #[test]
    fn test_classify_constraint() {
        assert!(matches!(
            classify_constraint("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
        assert!(matches!(
            classify_constraint("CHECK constraint failed: quantity > 0"),
            DbError::CheckViolation { .. }
        ));
        match classify_constraint("UNIQUE constraint failed: users.id") {
            DbError::UniqueViolation { field, .. } => assert_eq!(field, "users.id"),
            other => panic!("unexpected: {other}"),
        }
        assert!(matches!(
            classify_constraint("database is locked"),
            DbError::QueryFailed(_)
        ));
    }

    #[test]
    fn test_sqlx_mapping() {
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::NotFound { .. }
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::PoolExhausted
        ));
    }

    #[test]
    fn test_validation_becomes_invalid_data() {
        let err: DbError = ValidationError::Empty {
            field: "products".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Invalid stored data: products must not be empty");
    }
}
