//! # Money
//!
//! Credit balances, unit prices and sale totals as signed integer cents.
//!
//! ## Exact Boundaries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Headroom check on an edited sale:                                      │
//! │                                                                         │
//! │    credit 20.00 + old total 80.00  ==  new total 100.00                 │
//! │                                                                         │
//! │  In floating point the left side can land a hair under the right and    │
//! │  reject a sale the customer can afford. In cents it is 2000 + 8000 ==  │
//! │  10000, always.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Arithmetic that can be driven by request data (line totals, sums) goes
//! through the `checked_*` methods; the operator impls are for balances the
//! database already holds.
//!
//! ```rust
//! use tally_core::money::Money;
//!
//! let credit = Money::from_cents(10_000);
//! let total = Money::from_cents(4_000).checked_mul(2).unwrap();
//! assert_eq!(credit - total, Money::from_cents(2_000));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

/// An amount in cents. Negative values are allowed: refunds and ledger
/// adjustments move credit in both directions.
///
/// Serializes as a bare integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `self × qty`, or `None` on overflow.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(299).checked_mul(3), Some(Money::from_cents(897)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul(2), None);
    /// ```
    #[inline]
    pub fn checked_mul(self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    #[inline]
    pub fn checked_sub(self, other: Money) -> Option<Self> {
        self.0.checked_sub(other.0).map(Money)
    }
}

/// `$12.05`, `-$0.50`. Used in log fields and error messages.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    #[inline]
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    #[inline]
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1205).to_string(), "$12.05");
        assert_eq!(Money::from_cents(-50).to_string(), "-$0.50");
        assert_eq!(Money::zero().to_string(), "$0.00");
        assert_eq!(
            Money::from_cents(i64::MIN).to_string(),
            "-$92233720368547758.08"
        );
    }

    #[test]
    fn test_reconciliation_arithmetic() {
        let credit = Money::from_cents(2_000);
        let old_total = Money::from_cents(8_000);
        let new_total = Money::from_cents(1_000);

        assert_eq!(credit + old_total - new_total, Money::from_cents(9_000));
        assert_eq!(-old_total, Money::from_cents(-8_000));
    }

    #[test]
    fn test_checked_ops() {
        assert_eq!(
            Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)),
            None
        );
        assert_eq!(
            Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)),
            None
        );
        assert_eq!(
            Money::from_cents(500).checked_sub(Money::from_cents(800)),
            Some(Money::from_cents(-300))
        );
    }

    #[test]
    fn test_sum_and_ordering() {
        let total: Money = [100, 250, 650].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 1_000);
        assert!(Money::from_cents(2_000) >= Money::from_cents(2_000));
        assert!(Money::from_cents(-1).is_negative());
    }

    #[test]
    fn test_serde_is_plain_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(2500)).unwrap(), "2500");
        let back: Money = serde_json::from_str("-75").unwrap();
        assert_eq!(back, Money::from_cents(-75));
    }
}
