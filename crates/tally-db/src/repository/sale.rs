//! # Sale Repository
//!
//! Persistence boundary for sale headers, plus reads that assemble full
//! [`Sale`]s (header + pairs + derived total).
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (inside the engine's transaction)                           │
//! │     └── insert_in() → sales row                                        │
//! │     └── PairRepository::attach_in() → pairs owned by the sale          │
//! │                                                                         │
//! │  2. EDIT                                                               │
//! │     └── update_header_in() → date / manager / customer / billed        │
//! │     └── old pairs removed, new pairs attached                          │
//! │                                                                         │
//! │  3. READ (no transaction)                                              │
//! │     └── get_by_id() / find() / find_expanded()                         │
//! │                                                                         │
//! │  4. DELETE                                                             │
//! │     └── pairs removed first, then delete_in()                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The total is never stored. Every read prices the pairs it loaded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::pair::PairRepository;
use crate::repository::product::ProductRepository;
use crate::repository::user::UserRepository;
use crate::repository::IN_CLAUSE_CHUNK;
use tally_core::{Pair, Product, ProductLine, Sale, SaleExpansion, SaleFilter, SaleRecord, SaleView};

const SALE_COLUMNS: &str =
    "id, sale_date, manager_id, customer_id, billed_customer_id, created_at, updated_at";
const PAIR_COLUMNS: &str = "id, sale_id, product_id, quantity, unit_price_cents, position, created_at";

/// New header values for [`SaleRepository::update_header_in`].
#[derive(Debug, Clone, Copy)]
pub struct HeaderChange<'a> {
    pub sale_date: DateTime<Utc>,
    pub manager_id: Option<&'a str>,
    pub customer_id: Option<&'a str>,
    pub billed_customer_id: Option<&'a str>,
}

impl HeaderChange<'_> {
    /// Only the date changes.
    pub fn dated(sale_date: DateTime<Utc>) -> Self {
        HeaderChange {
            sale_date,
            manager_id: None,
            customer_id: None,
            billed_customer_id: None,
        }
    }
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale header by ID.
    pub async fn get_record(&self, id: &str) -> DbResult<Option<SaleRecord>> {
        let record = sqlx::query_as::<_, SaleRecord>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Gets a full sale (pairs and total) by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let Some(record) = self.get_record(id).await? else {
            return Ok(None);
        };

        let pairs = PairRepository::new(self.pool.clone())
            .list_for_sale(&record.id)
            .await?;

        Ok(Some(Sale::assemble(record, pairs)?))
    }

    /// Sale headers matching a filter, newest first.
    pub async fn find_records(&self, filter: &SaleFilter) -> DbResult<Vec<SaleRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {SALE_COLUMNS} FROM sales"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY sale_date DESC, id");

        let records = qb
            .build_query_as::<SaleRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Full sales matching a filter, newest first.
    pub async fn find(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let records = self.find_records(filter).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let mut pairs_by_sale = self.pairs_for_sales(&ids).await?;

        let mut sales = Vec::with_capacity(records.len());
        for record in records {
            let pairs = pairs_by_sale.remove(&record.id).unwrap_or_default();
            sales.push(Sale::assemble(record, pairs)?);
        }

        debug!(count = sales.len(), "Found sales");
        Ok(sales)
    }

    /// Sales matching a filter with the requested relations loaded.
    ///
    /// ## Expansion
    /// ```text
    /// manager   → SaleView.manager    (users)
    /// customer  → SaleView.customer   (users)
    /// products  → SaleView.lines      (pairs joined to products)
    /// ```
    /// A relation whose row has disappeared is left as `None` / skipped.
    pub async fn find_expanded(
        &self,
        filter: &SaleFilter,
        expansion: SaleExpansion,
    ) -> DbResult<Vec<SaleView>> {
        let sales = self.find(filter).await?;
        if expansion == SaleExpansion::none() {
            return Ok(sales.into_iter().map(SaleView::bare).collect());
        }

        let mut user_ids: Vec<String> = Vec::new();
        if expansion.manager {
            user_ids.extend(sales.iter().map(|s| s.manager_id.clone()));
        }
        if expansion.customer {
            user_ids.extend(sales.iter().map(|s| s.customer_id.clone()));
        }
        user_ids.sort();
        user_ids.dedup();

        let users: HashMap<_, _> = UserRepository::new(self.pool.clone())
            .get_many(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let products: HashMap<String, Product> = if expansion.products {
            let mut product_ids: Vec<String> = sales
                .iter()
                .flat_map(|s| s.products().iter().map(|p| p.product_id.clone()))
                .collect();
            product_ids.sort();
            product_ids.dedup();

            ProductRepository::new(self.pool.clone())
                .get_many(&product_ids)
                .await?
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect()
        } else {
            HashMap::new()
        };

        let views = sales
            .into_iter()
            .map(|sale| {
                let manager = expansion
                    .manager
                    .then(|| users.get(&sale.manager_id).cloned())
                    .flatten();
                let customer = expansion
                    .customer
                    .then(|| users.get(&sale.customer_id).cloned())
                    .flatten();
                let lines = expansion.products.then(|| {
                    sale.products()
                        .iter()
                        .filter_map(|pair| {
                            products.get(&pair.product_id).map(|product| ProductLine {
                                pair: pair.clone(),
                                product: product.clone(),
                            })
                        })
                        .collect()
                });

                SaleView {
                    sale,
                    manager,
                    customer,
                    lines,
                }
            })
            .collect();

        Ok(views)
    }

    /// Number of sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Pairs of many sales, grouped by sale and ordered by position.
    async fn pairs_for_sales(&self, sale_ids: &[String]) -> DbResult<HashMap<String, Vec<Pair>>> {
        let mut grouped: HashMap<String, Vec<Pair>> = HashMap::new();

        for chunk in sale_ids.chunks(IN_CLAUSE_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {PAIR_COLUMNS} FROM pairs WHERE sale_id IN ("
            ));
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(") ORDER BY position");

            let pairs = qb.build_query_as::<Pair>().fetch_all(&self.pool).await?;
            for pair in pairs {
                if let Some(sale_id) = pair.sale_id.clone() {
                    grouped.entry(sale_id).or_default().push(pair);
                }
            }
        }

        Ok(grouped)
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped operations
    // -------------------------------------------------------------------------

    /// Inserts a sale header.
    pub async fn insert_in(conn: &mut SqliteConnection, record: &SaleRecord) -> DbResult<()> {
        debug!(
            id = %record.id,
            customer_id = %record.customer_id,
            manager_id = %record.manager_id,
            "Inserting sale"
        );

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_date, manager_id, customer_id, billed_customer_id,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.id)
        .bind(record.sale_date)
        .bind(&record.manager_id)
        .bind(&record.customer_id)
        .bind(&record.billed_customer_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Rewrites a sale header. `None` keeps the stored value.
    pub async fn update_header_in(
        conn: &mut SqliteConnection,
        id: &str,
        header: HeaderChange<'_>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                sale_date = ?2,
                manager_id = COALESCE(?3, manager_id),
                customer_id = COALESCE(?4, customer_id),
                billed_customer_id = COALESCE(?5, billed_customer_id),
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(header.sale_date)
        .bind(header.manager_id)
        .bind(header.customer_id)
        .bind(header.billed_customer_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    /// Gets a sale header inside a transaction.
    pub async fn get_record_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<SaleRecord>> {
        let record = sqlx::query_as::<_, SaleRecord>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(record)
    }

    /// Loads a full sale inside a transaction.
    ///
    /// ## Errors
    /// `DbError::NotFound` if the sale doesn't exist.
    pub async fn load_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
        let record = Self::get_record_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;
        let pairs = PairRepository::list_for_sale_in(conn, id).await?;

        Ok(Sale::assemble(record, pairs)?)
    }

    /// Deletes a sale header. Its pairs must already be gone.
    pub async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Appends a WHERE clause for the set fields of a filter.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SaleFilter) {
    let mut keyword = " WHERE ";

    if let Some(id) = &filter.id {
        qb.push(keyword).push("id = ").push_bind(id.clone());
        keyword = " AND ";
    }
    if let Some(customer_id) = &filter.customer_id {
        qb.push(keyword)
            .push("customer_id = ")
            .push_bind(customer_id.clone());
        keyword = " AND ";
    }
    if let Some(manager_id) = &filter.manager_id {
        qb.push(keyword)
            .push("manager_id = ")
            .push_bind(manager_id.clone());
        keyword = " AND ";
    }
    if let Some(after) = filter.sold_after {
        qb.push(keyword).push("sale_date >= ").push_bind(after);
        keyword = " AND ";
    }
    if let Some(before) = filter.sold_before {
        qb.push(keyword).push("sale_date < ").push_bind(before);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
