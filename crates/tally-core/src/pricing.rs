//! # Pricing Calculator
//!
//! Sums `unit_price × quantity` over a set of pairs.
//!
//! ```text
//! Pair { unit_price: $40.00, qty: 2 } ──► $80.00 ─┐
//! Pair { unit_price: $10.00, qty: 1 } ──► $10.00 ─┼──► total_price = $90.00
//! ```
//!
//! Pure and order-independent: integer addition is associative, so the same
//! set of pairs always prices to the same total.

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::types::Pair;

/// Total of a set of pairs.
///
/// ## Errors
/// `ValidationError::OutOfRange` if a line or the sum overflows `i64` cents.
///
/// ## Example
/// ```rust
/// use tally_core::pricing::total_price;
///
/// assert_eq!(total_price(&[]).unwrap().cents(), 0);
/// ```
pub fn total_price(pairs: &[Pair]) -> ValidationResult<Money> {
    pairs.iter().try_fold(Money::zero(), |total, pair| {
        pair.line_total()
            .and_then(|line| total.checked_add(line))
            .ok_or_else(amount_overflow)
    })
}

fn amount_overflow() -> ValidationError {
    ValidationError::OutOfRange {
        field: "total price".to_string(),
        min: 0,
        max: i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pair(unit_price_cents: i64, quantity: i64) -> Pair {
        Pair {
            id: uuid::Uuid::new_v4().to_string(),
            sale_id: None,
            product_id: "p".to_string(),
            quantity,
            unit_price_cents,
            position: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_price() {
        let pairs = vec![pair(4000, 2), pair(1000, 1), pair(199, 3)];
        assert_eq!(total_price(&pairs).unwrap().cents(), 8000 + 1000 + 597);
    }

    #[test]
    fn test_total_price_is_order_independent_and_repeatable() {
        let mut pairs = vec![pair(4000, 2), pair(1000, 1), pair(199, 3)];
        let first = total_price(&pairs).unwrap();

        pairs.reverse();
        assert_eq!(total_price(&pairs).unwrap(), first);
        assert_eq!(total_price(&pairs).unwrap(), first);
    }

    #[test]
    fn test_empty_total_is_zero() {
        assert!(total_price(&[]).unwrap().is_zero());
    }

    #[test]
    fn test_overflow_is_reported() {
        assert!(total_price(&[pair(i64::MAX, 2)]).is_err());
        assert!(total_price(&[pair(i64::MAX, 1), pair(1, 1)]).is_err());
    }
}
