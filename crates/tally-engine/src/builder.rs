//! # Line-Item Builder
//!
//! Turns `(product, quantity)` requests into staged, priced pairs.
//!
//! Each pair is written inside the caller's transaction with the product's
//! current price frozen into it. The first failure stops the build and is
//! returned; whatever was staged before it stays in the transaction for the
//! caller to commit or roll back.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::EngineResult;
use tally_core::{ItemRequest, Pair};
use tally_db::PairRepository;

/// Builds staged pairs for a sale request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineItemBuilder;

impl LineItemBuilder {
    /// Stages one pair per request, in request order.
    ///
    /// ## Errors
    /// - `EngineError::NotFound` for an unknown product
    /// - `EngineError::Persistence` for any other write failure
    pub async fn build(
        conn: &mut SqliteConnection,
        items: &[ItemRequest],
    ) -> EngineResult<Vec<Pair>> {
        let mut pairs = Vec::with_capacity(items.len());

        for (position, item) in items.iter().enumerate() {
            let pair =
                PairRepository::stage_in(conn, &item.product_id, item.quantity, position as i64)
                    .await?;
            pairs.push(pair);
        }

        debug!(count = pairs.len(), "Built pairs");
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use tally_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_build_preserves_order_and_prices() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sugar = db.products().create("Sugar", 4000).await.unwrap();
        let tea = db.products().create("Tea", 1000).await.unwrap();

        let items = vec![
            ItemRequest::new(&tea.id, 3),
            ItemRequest::new(&sugar.id, 1),
            ItemRequest::new(&tea.id, 1),
        ];

        let mut tx = db.begin().await.unwrap();
        let pairs = LineItemBuilder::build(&mut tx, &items).await.unwrap();

        let products: Vec<&str> = pairs.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(products, vec![tea.id.as_str(), sugar.id.as_str(), tea.id.as_str()]);
        let prices: Vec<i64> = pairs.iter().map(|p| p.unit_price_cents).collect();
        assert_eq!(prices, vec![1000, 4000, 1000]);
        assert!(pairs.iter().all(|p| p.sale_id.is_none()));
    }

    #[tokio::test]
    async fn test_build_stops_at_first_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tea = db.products().create("Tea", 1000).await.unwrap();

        let items = vec![
            ItemRequest::new(&tea.id, 1),
            ItemRequest::new("missing-1", 1),
            ItemRequest::new("missing-2", 1),
        ];

        let mut tx = db.begin().await.unwrap();
        let err = LineItemBuilder::build(&mut tx, &items).await.unwrap_err();
        match err {
            EngineError::NotFound { entity, id } => {
                assert_eq!(entity, "Product");
                assert_eq!(id, "missing-1");
            }
            other => panic!("unexpected error: {other}"),
        }

        tx.rollback().await.unwrap();
        assert_eq!(db.pairs().count().await.unwrap(), 0);
    }
}
