//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//!   ValidationError ──► CoreError ──┐
//!   (this crate)        (this crate) │
//!                                    ▼
//!                               EngineError ◄── DbError
//!                               (tally-engine)   (tally-db)
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Rule violations found by the pure checks in this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The customer's credit does not cover the sale. Raised by
    /// [`credit::ensure_sufficient`](crate::credit::ensure_sufficient).
    ///
    /// ## User Workflow
    /// ```text
    /// Record sale (total: $25.00)
    ///      │
    ///      ▼
    /// Check credit: available=$20.00
    ///      │
    ///      ▼
    /// InsufficientCredit { required: $25.00, available: $20.00 }
    ///      │
    ///      ▼
    /// UI shows: "Not enough credit"
    /// ```
    ///
    /// Not a system fault: the caller can always recover by adjusting the
    /// request.
    #[error("Insufficient credit for customer {customer_id}: required {required}, available {available}")]
    InsufficientCredit {
        customer_id: String,
        required: Money,
        available: Money,
    },

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A request that is wrong on its face. Raised before the first write, so
/// nothing needs undoing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Blank id or other mandatory text.
    #[error("{field} is required")]
    Required { field: String },

    /// Quantity of zero or below.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Also used when money arithmetic on a request would overflow.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// No line items, or a delete filter that would match every sale.
    #[error("{field} must not be empty")]
    Empty { field: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_credit_message() {
        let err = CoreError::InsufficientCredit {
            customer_id: "c1".to_string(),
            required: Money::from_cents(2500),
            available: Money::from_cents(2000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient credit for customer c1: required $25.00, available $20.00"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");

        let err = ValidationError::Empty {
            field: "products".to_string(),
        };
        assert_eq!(err.to_string(), "products must not be empty");
    }

    #[test]
    fn test_core_error_wraps_validation() {
        let err: CoreError = ValidationError::Required {
            field: "customer_id".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Invalid request: customer_id is required");
    }
}
