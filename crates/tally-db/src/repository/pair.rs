//! # Pair Repository
//!
//! Line items ("pairs") and their two-phase lifecycle.
//!
//! ## Pair Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. STAGE                                                              │
//! │     └── stage_in() → Pair { sale_id: None, unit_price: frozen }        │
//! │         price copied from products in the same INSERT                  │
//! │                                                                         │
//! │  2a. COMMIT                                                            │
//! │     └── attach_in() → Pair { sale_id: Some(sale) }                     │
//! │                                                                         │
//! │  2b. DISCARD                                                           │
//! │     └── transaction rolled back → staged rows never existed           │
//! │                                                                         │
//! │  3. SUPERSEDE (sale edited or deleted)                                 │
//! │     └── remove_for_sale_in() → old pairs deleted, returned for pricing │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::Pair;

const PAIR_COLUMNS: &str = "id, sale_id, product_id, quantity, unit_price_cents, position, created_at";

/// Repository for pair database operations.
#[derive(Debug, Clone)]
pub struct PairRepository {
    pool: SqlitePool,
}

impl PairRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PairRepository { pool }
    }

    /// Pairs owned by a sale, in request order.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Pair>> {
        let pairs = sqlx::query_as::<_, Pair>(&format!(
            "SELECT {PAIR_COLUMNS} FROM pairs WHERE sale_id = ?1 ORDER BY position"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pairs)
    }

    /// Number of pairs not attached to any sale.
    pub async fn count_unattached(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pairs WHERE sale_id IS NULL")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Total number of pairs.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pairs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped operations
    // -------------------------------------------------------------------------

    /// Stages one pair, freezing the product's current price.
    ///
    /// ## Snapshot Pattern
    /// The unit price is read from `products` by the INSERT itself, so the
    /// captured price is the one current at the instant the pair exists.
    ///
    /// ## Errors
    /// `DbError::NotFound` if the product doesn't exist.
    pub async fn stage_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        position: i64,
    ) -> DbResult<Pair> {
        debug!(product_id = %product_id, quantity, position, "Staging pair");

        let pair = sqlx::query_as::<_, Pair>(&format!(
            r#"
            INSERT INTO pairs (id, sale_id, product_id, quantity, unit_price_cents, position, created_at)
            SELECT ?1, NULL, p.id, ?3, p.price_cents, ?4, ?5
            FROM products p
            WHERE p.id = ?2
            RETURNING {PAIR_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(product_id)
        .bind(quantity)
        .bind(position)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        pair.ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Binds staged pairs to their sale.
    pub async fn attach_in(
        conn: &mut SqliteConnection,
        sale_id: &str,
        pairs: &mut [Pair],
    ) -> DbResult<()> {
        for pair in pairs.iter_mut() {
            let result = sqlx::query("UPDATE pairs SET sale_id = ?2 WHERE id = ?1 AND sale_id IS NULL")
                .bind(&pair.id)
                .bind(sale_id)
                .execute(&mut *conn)
                .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Staged pair", &pair.id));
            }
            pair.sale_id = Some(sale_id.to_string());
        }

        debug!(sale_id = %sale_id, count = pairs.len(), "Attached pairs");
        Ok(())
    }

    /// Pairs owned by a sale, read inside a transaction.
    pub async fn list_for_sale_in(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<Pair>> {
        let pairs = sqlx::query_as::<_, Pair>(&format!(
            "SELECT {PAIR_COLUMNS} FROM pairs WHERE sale_id = ?1 ORDER BY position"
        ))
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(pairs)
    }

    /// Deletes every pair of a sale and returns what was deleted.
    pub async fn remove_for_sale_in(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<Pair>> {
        let mut removed = sqlx::query_as::<_, Pair>(&format!(
            "DELETE FROM pairs WHERE sale_id = ?1 RETURNING {PAIR_COLUMNS}"
        ))
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        removed.sort_by_key(|p| p.position);
        debug!(sale_id = %sale_id, count = removed.len(), "Removed pairs");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_stage_freezes_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create("Sugar", 4000).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let pair = PairRepository::stage_in(&mut tx, &product.id, 2, 0).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(pair.unit_price_cents, 4000);
        assert_eq!(pair.quantity, 2);
        assert!(pair.sale_id.is_none());

        db.products().update_price(&product.id, 9999).await.unwrap();
        assert_eq!(db.pairs().count_unattached().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stage_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        let result = PairRepository::stage_in(&mut tx, "missing", 1, 0).await;
        assert!(matches!(result, Err(DbError::NotFound { ref entity, .. }) if entity == "Product"));
    }

    #[tokio::test]
    async fn test_stage_rejects_non_positive_quantity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create("Salt", 100).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        let result = PairRepository::stage_in(&mut tx, &product.id, 0, 0).await;
        assert!(matches!(result, Err(DbError::CheckViolation { .. })));
    }

    #[tokio::test]
    async fn test_rolled_back_stage_leaves_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create("Tea", 100).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        PairRepository::stage_in(&mut tx, &product.id, 1, 0).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(db.pairs().count().await.unwrap(), 0);
    }
}
