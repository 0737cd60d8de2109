//! # Credit Ledger
//!
//! The authority for customer balances. Every write goes through a guarded
//! single-statement update in the caller's transaction, so a balance is
//! never written back from a stale read and a debit can never take it
//! below zero, whether or not the caller holds the customer's lock.
//!
//! ## Operations
//! ```text
//! check_sufficient(customer, amount)   credit >= amount        (pure)
//! balance(customer)                    current credit
//! debit(customer, amount)              credit -= amount        guarded
//! credit(customer, amount)             credit += amount        refund
//! adjust(customer, delta)              credit += delta         guarded if delta < 0
//! ```

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::EngineResult;
use tally_core::{credit as rules, CoreError, Money, User, ValidationError};
use tally_db::{CreditChange, UserRepository};

/// Credit operations over the users table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreditLedger;

impl CreditLedger {
    /// True iff the customer's credit covers `amount`.
    pub fn check_sufficient(customer: &User, amount: Money) -> bool {
        rules::is_sufficient(customer.credit(), amount)
    }

    /// Current balance.
    pub async fn balance(conn: &mut SqliteConnection, customer_id: &str) -> EngineResult<Money> {
        let customer = UserRepository::fetch_in(conn, customer_id).await?;
        Ok(customer.credit())
    }

    /// Takes `amount` from the balance.
    ///
    /// ## Errors
    /// `EngineError::InsufficientCredit` if the balance would go negative;
    /// nothing is written in that case.
    pub async fn debit(
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> EngineResult<()> {
        ensure_non_negative(amount)?;
        Self::adjust(conn, customer_id, -amount).await
    }

    /// Returns `amount` to the balance.
    pub async fn credit(
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> EngineResult<()> {
        ensure_non_negative(amount)?;
        Self::adjust(conn, customer_id, amount).await
    }

    /// Applies a signed change. Negative changes are refused if they would
    /// overdraw the balance.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        customer_id: &str,
        delta: Money,
    ) -> EngineResult<()> {
        if delta.is_zero() {
            // Still confirm the customer exists.
            UserRepository::fetch_in(conn, customer_id).await?;
            return Ok(());
        }

        match UserRepository::change_credit_in(conn, customer_id, delta.cents()).await? {
            CreditChange::Applied => {
                debug!(customer_id = %customer_id, delta = %delta, "Credit adjusted");
                Ok(())
            }
            CreditChange::WouldOverdraw => {
                let available = Self::balance(conn, customer_id).await?;
                warn!(
                    customer_id = %customer_id,
                    required = %(-delta),
                    available = %available,
                    "Refused debit that would overdraw credit"
                );
                Err(CoreError::InsufficientCredit {
                    customer_id: customer_id.to_string(),
                    required: -delta,
                    available,
                }
                .into())
            }
            CreditChange::WouldOverflow => {
                warn!(customer_id = %customer_id, delta = %delta, "Refused credit past i64 range");
                Err(ValidationError::OutOfRange {
                    field: "credit".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into())
            }
        }
    }
}

fn ensure_non_negative(amount: Money) -> Result<(), ValidationError> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use tally_core::UserRole;
    use tally_db::{Database, DbConfig};

    async fn customer(db: &Database, credit_cents: i64) -> User {
        db.users()
            .create("Ada", UserRole::Customer, credit_cents)
            .await
            .unwrap()
    }

    #[test]
    fn test_check_sufficient_is_inclusive() {
        let now = chrono::Utc::now();
        let user = User {
            id: "c1".to_string(),
            name: "Ada".to_string(),
            role: UserRole::Customer,
            credit_cents: 2000,
            created_at: now,
            updated_at: now,
        };

        assert!(CreditLedger::check_sufficient(&user, Money::from_cents(2000)));
        assert!(!CreditLedger::check_sufficient(&user, Money::from_cents(2001)));
    }

    #[tokio::test]
    async fn test_debit_and_credit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ada = customer(&db, 10_000).await;

        let mut tx = db.begin().await.unwrap();
        CreditLedger::debit(&mut tx, &ada.id, Money::from_cents(8_000))
            .await
            .unwrap();
        CreditLedger::credit(&mut tx, &ada.id, Money::from_cents(500))
            .await
            .unwrap();
        let balance = CreditLedger::balance(&mut tx, &ada.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(balance.cents(), 2_500);
    }

    #[tokio::test]
    async fn test_debit_never_overdraws() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ada = customer(&db, 2_000).await;

        let mut tx = db.begin().await.unwrap();
        let err = CreditLedger::debit(&mut tx, &ada.id, Money::from_cents(2_500))
            .await
            .unwrap_err();
        match err {
            EngineError::InsufficientCredit {
                required,
                available,
                ..
            } => {
                assert_eq!(required.cents(), 2_500);
                assert_eq!(available.cents(), 2_000);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Exactly the balance is fine.
        CreditLedger::debit(&mut tx, &ada.id, Money::from_cents(2_000))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let ada = db.users().get_by_id(&ada.id).await.unwrap().unwrap();
        assert_eq!(ada.credit_cents, 0);
    }

    #[tokio::test]
    async fn test_adjust_signed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ada = customer(&db, 2_000).await;

        let mut tx = db.begin().await.unwrap();
        // 20 + 80 - 10
        CreditLedger::adjust(&mut tx, &ada.id, Money::from_cents(7_000))
            .await
            .unwrap();
        assert!(CreditLedger::adjust(&mut tx, &ada.id, Money::from_cents(-9_001))
            .await
            .unwrap_err()
            .is_insufficient_credit());
        CreditLedger::adjust(&mut tx, &ada.id, Money::zero())
            .await
            .unwrap();
        assert_eq!(
            CreditLedger::balance(&mut tx, &ada.id).await.unwrap().cents(),
            9_000
        );
    }

    #[tokio::test]
    async fn test_credit_past_range_is_refused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ada = customer(&db, i64::MAX).await;

        let mut tx = db.begin().await.unwrap();
        let err = CreditLedger::credit(&mut tx, &ada.id, Money::from_cents(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(
            CreditLedger::balance(&mut tx, &ada.id).await.unwrap().cents(),
            i64::MAX
        );
    }

    #[tokio::test]
    async fn test_rejects_negative_amounts_and_unknown_customers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ada = customer(&db, 2_000).await;

        let mut tx = db.begin().await.unwrap();
        let err = CreditLedger::debit(&mut tx, &ada.id, Money::from_cents(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = CreditLedger::credit(&mut tx, "ghost", Money::from_cents(100))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
