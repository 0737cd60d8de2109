//! # Credit Rules
//!
//! The pure half of the credit ledger: when a balance covers an amount, and
//! what a balance becomes after a sale is edited. The persisted half lives in
//! `tally-engine`.
//!
//! ## Update Reconciliation
//! ```text
//! credit = 20, sale being edited was 80, new total is 10
//!
//!   headroom  = credit + old_total        = 100   (as if never debited)
//!   admitted  = headroom >= new_total     = true  (boundary inclusive)
//!   credit'   = credit + old - new        = 90
//! ```
//!
//! Balances come from storage and totals from requests, so the sums here
//! are checked. A sum that leaves `i64` cents is `OutOfRange`, never a
//! wrapped balance.

use crate::error::{CoreError, CoreResult, ValidationError, ValidationResult};
use crate::money::Money;

/// True iff `credit` covers `amount`. Equality is sufficient.
#[inline]
pub fn is_sufficient(credit: Money, amount: Money) -> bool {
    credit >= amount
}

/// Refuses `required` unless `available` covers it.
///
/// ## Errors
/// `CoreError::InsufficientCredit` carrying both amounts.
///
/// ```rust
/// use tally_core::credit::ensure_sufficient;
/// use tally_core::money::Money;
///
/// assert!(ensure_sufficient("c1", Money::from_cents(2000), Money::from_cents(2000)).is_ok());
/// assert!(ensure_sufficient("c1", Money::from_cents(2000), Money::from_cents(2500)).is_err());
/// ```
pub fn ensure_sufficient(customer_id: &str, available: Money, required: Money) -> CoreResult<()> {
    if is_sufficient(available, required) {
        return Ok(());
    }

    Err(CoreError::InsufficientCredit {
        customer_id: customer_id.to_string(),
        required,
        available,
    })
}

/// Credit as if the sale being edited had never been debited.
pub fn headroom(credit: Money, old_total: Money) -> ValidationResult<Money> {
    credit.checked_add(old_total).ok_or_else(credit_overflow)
}

/// Signed ledger adjustment that replaces an `old_total` debit with `new_total`.
pub fn reconciliation_delta(old_total: Money, new_total: Money) -> ValidationResult<Money> {
    old_total.checked_sub(new_total).ok_or_else(credit_overflow)
}

fn credit_overflow() -> ValidationError {
    ValidationError::OutOfRange {
        field: "credit".to_string(),
        min: i64::MIN,
        max: i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_sufficient_boundary_inclusive() {
        assert!(is_sufficient(Money::from_cents(100), Money::from_cents(80)));
        assert!(is_sufficient(Money::from_cents(80), Money::from_cents(80)));
        assert!(!is_sufficient(Money::from_cents(20), Money::from_cents(25)));
    }

    #[test]
    fn test_update_reconciliation() {
        let credit = Money::from_cents(2000);
        let old_total = Money::from_cents(8000);
        let new_total = Money::from_cents(1000);

        let room = headroom(credit, old_total).unwrap();
        assert_eq!(room.cents(), 10000);
        assert!(is_sufficient(room, new_total));

        let delta = reconciliation_delta(old_total, new_total).unwrap();
        assert_eq!((credit + delta).cents(), 9000);
    }

    #[test]
    fn test_headroom_exactly_equal_is_admitted() {
        let room = headroom(Money::from_cents(500), Money::from_cents(1500)).unwrap();
        assert!(ensure_sufficient("c1", room, Money::from_cents(2000)).is_ok());

        match ensure_sufficient("c1", room, Money::from_cents(2001)) {
            Err(CoreError::InsufficientCredit {
                customer_id,
                required,
                available,
            }) => {
                assert_eq!(customer_id, "c1");
                assert_eq!(required.cents(), 2001);
                assert_eq!(available.cents(), 2000);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_overflowing_headroom_is_out_of_range() {
        let err = headroom(Money::from_cents(i64::MAX), Money::from_cents(1000)).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "credit"));

        assert!(reconciliation_delta(Money::from_cents(i64::MIN), Money::from_cents(1)).is_err());
    }
}
