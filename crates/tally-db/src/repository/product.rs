//! # Product Repository
//!
//! Database operations for products. The engine only reads prices; writes
//! exist for catalog maintenance and seeding.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::IN_CLAUSE_CHUNK;
use tally_core::Product;

const PRODUCT_COLUMNS: &str = "id, name, price_cents, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Loads several products at once, in no particular order.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut products = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("
            ));
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");

            products.extend(qb.build_query_as::<Product>().fetch_all(&self.pool).await?);
        }

        Ok(products)
    }

    /// Lists products sorted by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Number of products in the catalog.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Creates a product with a generated ID.
    pub async fn create(&self, name: &str, price_cents: i64) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            price_cents,
            created_at: now,
            updated_at: now,
        };

        self.insert(&product).await?;
        Ok(product)
    }

    /// Inserts a product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Changes a product's current price. Existing pairs keep their snapshot.
    pub async fn update_price(&self, id: &str, price_cents: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET price_cents = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let created = repo.create("Rice 1kg", 450).await.unwrap();
        let found = repo.get_by_id(&created.id).await.unwrap().unwrap();

        assert_eq!(found.name, "Rice 1kg");
        assert_eq!(found.price().cents(), 450);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.create("Oil", 300).await.unwrap();
        repo.update_price(&product.id, 350).await.unwrap();

        let found = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.price_cents, 350);
        assert!(repo.update_price("missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_get_many_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let a = repo.create("Beans", 200).await.unwrap();
        let b = repo.create("Apples", 100).await.unwrap();

        let many = repo.get_many(&[a.id.clone(), b.id.clone()]).await.unwrap();
        assert_eq!(many.len(), 2);
        assert!(repo.get_many(&[]).await.unwrap().is_empty());

        let listed = repo.list(10).await.unwrap();
        assert_eq!(listed.first().map(|p| p.name.as_str()), Some("Apples"));
    }
}
