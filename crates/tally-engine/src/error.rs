//! # Engine Error Type
//!
//! The error taxonomy request layers see.
//!
//! ## Error Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ValidationError ─────────────────────► Validation          400        │
//! │  DbError::NotFound ───────────────────► NotFound            404        │
//! │  CoreError::InsufficientCredit ───────► InsufficientCredit  422        │
//! │  any other DbError ───────────────────► Persistence         500        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `InsufficientCredit` is a business outcome, not a fault: it carries the
//! required and available amounts so the caller can render them.

use serde::Serialize;
use tally_core::{CoreError, Money, ValidationError};
use tally_db::DbError;
use thiserror::Error;

/// Errors returned by the sale engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input, rejected before any write.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown sale, customer, manager or product.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The customer's credit does not cover the sale.
    #[error("Insufficient credit for customer {customer_id}: required {required}, available {available}")]
    InsufficientCredit {
        customer_id: String,
        required: Money,
        available: Money,
    },

    /// Storage-layer fault, surfaced verbatim.
    #[error("Database error: {0}")]
    Persistence(DbError),
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InsufficientCredit,
    DatabaseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InsufficientCredit => "INSUFFICIENT_CREDIT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
        }
    }
}

/// Serializable form of an [`EngineError`].
///
/// ```json
/// { "code": "INSUFFICIENT_CREDIT", "message": "Insufficient credit for customer ..." }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::InsufficientCredit { .. } => ErrorCode::InsufficientCredit,
            EngineError::Persistence(_) => ErrorCode::DatabaseError,
        }
    }

    pub fn is_insufficient_credit(&self) -> bool {
        matches!(self, EngineError::InsufficientCredit { .. })
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => {
                tracing::error!(error = %other, "Database operation failed");
                EngineError::Persistence(other)
            }
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientCredit {
                customer_id,
                required,
                available,
            } => EngineError::InsufficientCredit {
                customer_id,
                required,
                available,
            },
            CoreError::Validation(e) => EngineError::Validation(e),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_not_found_stays_not_found() {
        let err: EngineError = DbError::not_found("Product", "p-9").into();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.to_string(), "Product not found: p-9");
    }

    #[test]
    fn test_other_db_errors_are_persistence() {
        let err: EngineError = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".to_string(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert!(matches!(err, EngineError::Persistence(_)));
    }

    #[test]
    fn test_insufficient_credit_response() {
        let err: EngineError = CoreError::InsufficientCredit {
            customer_id: "c1".to_string(),
            required: Money::from_cents(2500),
            available: Money::from_cents(2000),
        }
        .into();

        assert!(err.is_insufficient_credit());
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_CREDIT");
        assert_eq!(
            json["message"],
            "Insufficient credit for customer c1: required $25.00, available $20.00"
        );
    }

    #[test]
    fn test_validation_code() {
        let err: EngineError = ValidationError::Empty {
            field: "products".to_string(),
        }
        .into();
        assert_eq!(err.code().as_str(), "VALIDATION_ERROR");
    }
}
