//! # Validation Module
//!
//! Input validation for sale requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer                                                │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, called by the engine before any write           │
//! │  ├── ids present                                                       │
//! │  ├── at least one item, not too many                                   │
//! │  └── every quantity in 1..=max                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity > 0)                                              │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_items, SaleLimits};
//! use tally_core::ItemRequest;
//!
//! let items = vec![ItemRequest::new("p1", 2)];
//! validate_items(&items, &SaleLimits::default()).unwrap();
//! ```

use crate::error::{ValidationError, ValidationResult};
use crate::types::ItemRequest;
use crate::{DEFAULT_MAX_ITEMS_PER_SALE, DEFAULT_MAX_ITEM_QUANTITY};

/// Size limits for a single sale request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleLimits {
    pub max_items: usize,
    pub max_item_quantity: i64,
}

impl Default for SaleLimits {
    fn default() -> Self {
        SaleLimits {
            max_items: DEFAULT_MAX_ITEMS_PER_SALE,
            max_item_quantity: DEFAULT_MAX_ITEM_QUANTITY,
        }
    }
}

/// Validates that an id is present.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_id;
///
/// assert!(validate_id("customer_id", "c-1").is_ok());
/// assert!(validate_id("customer_id", "  ").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `max`
pub fn validate_quantity(qty: i64, max: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max,
        });
    }

    Ok(())
}

/// Validates the product lines of a create or update request.
pub fn validate_items(items: &[ItemRequest], limits: &SaleLimits) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Empty {
            field: "products".to_string(),
        });
    }

    if items.len() > limits.max_items {
        return Err(ValidationError::OutOfRange {
            field: "products".to_string(),
            min: 1,
            max: limits.max_items as i64,
        });
    }

    for item in items {
        validate_id("product_id", &item.product_id)?;
        validate_quantity(item.quantity, limits.max_item_quantity)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1, 999).is_ok());
        assert!(validate_quantity(999, 999).is_ok());

        assert!(validate_quantity(0, 999).is_err());
        assert!(validate_quantity(-1, 999).is_err());
        assert!(validate_quantity(1000, 999).is_err());
    }

    #[test]
    fn test_validate_items() {
        let limits = SaleLimits::default();

        assert!(validate_items(&[ItemRequest::new("p1", 2)], &limits).is_ok());
        assert_eq!(
            validate_items(&[], &limits),
            Err(ValidationError::Empty {
                field: "products".to_string()
            })
        );
        assert!(validate_items(&[ItemRequest::new("", 2)], &limits).is_err());
        assert!(validate_items(&[ItemRequest::new("p1", 0)], &limits).is_err());
    }

    #[test]
    fn test_validate_items_limits_count() {
        let limits = SaleLimits {
            max_items: 2,
            max_item_quantity: 10,
        };
        let items = vec![ItemRequest::new("p1", 1); 3];
        assert!(validate_items(&items, &limits).is_err());
        assert!(validate_items(&items[..2], &limits).is_ok());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("sale_id", "abc").is_ok());
        assert!(validate_id("sale_id", "").is_err());
    }
}
