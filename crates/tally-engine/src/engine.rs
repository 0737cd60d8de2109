//! # Sale Transaction Engine
//!
//! Creates, edits and deletes sales so that pairs, totals and customer
//! credit never disagree.
//!
//! ## Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  validate ──► lock customer ──► BEGIN                                  │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                       stage pairs (prices frozen)                       │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                    load customer, total = Σ pairs                       │
//! │                                   │                                     │
//! │                 credit < total ───┼─── credit >= total                  │
//! │                       │                      │                          │
//! │                       ▼                      ▼                          │
//! │                  ROLLBACK              insert sale                      │
//! │           (staged pairs vanish)        attach pairs                     │
//! │                       │                debit customer                   │
//! │                       ▼                COMMIT                           │
//! │              InsufficientCredit              │                          │
//! │                                              ▼                          │
//! │                                            Sale                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Update
//! Same shape, with the check made against the headroom
//! `credit + old_total` and the ledger moved by `old_total - new_total`.
//! The old pairs are removed and the new ones attached only after the
//! check passes.
//!
//! ## Atomicity
//! One SQLite transaction per operation. Rolling it back is the
//! compensating delete: staged pairs, the sale row and the credit write
//! either all commit or none do. Each transaction starts with a write so
//! it holds SQLite's write lock from its first statement.

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::builder::LineItemBuilder;
use crate::config::{CustomerChangePolicy, DeletePolicy, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::ledger::CreditLedger;
use crate::locks::{customer_key, sale_key, LockManager};
use tally_core::validation::{validate_id, validate_items};
use tally_core::{
    credit as rules, pricing, NewSale, Sale, SaleExpansion, SaleFilter, SaleRecord, SaleUpdate,
    SaleView, ValidationError,
};
use tally_db::{Database, DbError, HeaderChange, PairRepository, SaleRepository, UserRepository};

/// The sale transaction engine. Cheap to clone; clones share locks.
#[derive(Debug, Clone)]
pub struct SaleEngine {
    db: Database,
    config: EngineConfig,
    locks: LockManager,
}

impl SaleEngine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        SaleEngine {
            db,
            config,
            locks: LockManager::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Records a sale and debits its customer.
    ///
    /// `acting_user_id` is the manager recorded when the request names none.
    ///
    /// ## Errors
    /// - `Validation` for an empty item list, bad quantity or missing id
    /// - `NotFound` for an unknown customer or product
    /// - `InsufficientCredit` if the total exceeds the customer's credit
    /// - `Persistence` for anything else, e.g. an unknown manager
    pub async fn create_sale(&self, acting_user_id: &str, request: NewSale) -> EngineResult<Sale> {
        validate_id("customer_id", &request.customer_id)?;
        let manager_id = request
            .manager_id
            .clone()
            .unwrap_or_else(|| acting_user_id.to_string());
        validate_id("manager_id", &manager_id)?;
        validate_items(&request.products, &self.config.limits())?;

        let _scope = self.locks.acquire([customer_key(&request.customer_id)]).await;

        let mut tx = self.db.begin().await?;
        let result = create_in(&mut tx, &manager_id, &request).await;
        let sale = finish(tx, result).await?;

        info!(
            sale_id = %sale.id,
            customer_id = %sale.customer_id,
            manager_id = %sale.manager_id,
            total = %sale.total_price(),
            items = sale.products().len(),
            "Sale created"
        );
        Ok(sale)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Replaces a sale's header fields and pairs, reconciling credit.
    ///
    /// Credit is reconciled against the sale's billed customer. Which
    /// customer is charged when the request names a different one is set by
    /// [`CustomerChangePolicy`].
    pub async fn update_sale(&self, sale_id: &str, request: SaleUpdate) -> EngineResult<Sale> {
        validate_id("sale_id", sale_id)?;
        if let Some(customer_id) = &request.customer_id {
            validate_id("customer_id", customer_id)?;
        }
        if let Some(manager_id) = &request.manager_id {
            validate_id("manager_id", manager_id)?;
        }
        validate_items(&request.products, &self.config.limits())?;

        let mut scope = self.locks.acquire([sale_key(sale_id)]).await;

        // The stored customer cannot change while the sale lock is held.
        let stored = self
            .db
            .sales()
            .get_record(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))?;

        let mut customers = vec![customer_key(&stored.billed_customer_id)];
        if self.config.customer_change_policy == CustomerChangePolicy::Reassign {
            if let Some(new_customer) = &request.customer_id {
                customers.push(customer_key(new_customer));
            }
        }
        scope.extend(self.locks.acquire(customers).await);

        let mut tx = self.db.begin().await?;
        let result = update_in(
            &mut tx,
            sale_id,
            &request,
            self.config.customer_change_policy,
        )
        .await;
        let sale = finish(tx, result).await?;

        info!(
            sale_id = %sale.id,
            customer_id = %sale.customer_id,
            total = %sale.total_price(),
            items = sale.products().len(),
            "Sale updated"
        );
        Ok(sale)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes every sale matching `filter` with its pairs. Returns how many
    /// sales were deleted.
    ///
    /// Credit is refunded only under [`DeletePolicy::Refund`]. An empty
    /// filter is refused rather than deleting everything.
    pub async fn delete_sales(&self, filter: &SaleFilter) -> EngineResult<u64> {
        if filter.is_empty() {
            return Err(ValidationError::Empty {
                field: "filter".to_string(),
            }
            .into());
        }

        let candidates = self.db.sales().find_records(filter).await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let mut scope = self
            .locks
            .acquire(candidates.iter().map(|r| sale_key(&r.id)))
            .await;

        // Re-read under the sale locks; a sale may have been deleted or
        // billed to another customer in the meantime.
        let mut records = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            if let Some(record) = self.db.sales().get_record(&candidate.id).await? {
                records.push(record);
            }
        }

        if self.config.delete_policy == DeletePolicy::Refund {
            scope.extend(
                self.locks
                    .acquire(records.iter().map(|r| customer_key(&r.billed_customer_id)))
                    .await,
            );
        }

        let mut tx = self.db.begin().await?;
        let result = delete_in(&mut tx, &records, self.config.delete_policy).await;
        let deleted = finish(tx, result).await?;

        info!(
            deleted,
            policy = %self.config.delete_policy,
            "Sales deleted"
        );
        Ok(deleted)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Loads one sale with its pairs and total.
    pub async fn get_sale(&self, sale_id: &str) -> EngineResult<Sale> {
        self.db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))
    }

    /// Sales matching `filter`, newest first, with the requested relations.
    pub async fn find_sales(
        &self,
        filter: &SaleFilter,
        expansion: SaleExpansion,
    ) -> EngineResult<Vec<SaleView>> {
        Ok(self.db.sales().find_expanded(filter, expansion).await?)
    }
}

// =============================================================================
// Transaction Bodies
// =============================================================================

/// Commits on success, rolls back on failure.
///
/// A failed rollback is logged and dropped: the operation's own error is the
/// one the caller needs, and SQLite discards an unfinished transaction when
/// the connection is reset anyway.
async fn finish<T>(tx: Transaction<'static, Sqlite>, result: EngineResult<T>) -> EngineResult<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            debug!(error = %err, "Transaction rolled back");
            Err(err)
        }
    }
}

async fn create_in(
    conn: &mut SqliteConnection,
    manager_id: &str,
    request: &NewSale,
) -> EngineResult<Sale> {
    let mut pairs = LineItemBuilder::build(conn, &request.products).await?;

    let customer = UserRepository::fetch_in(conn, &request.customer_id).await?;
    let total = pricing::total_price(&pairs)?;

    rules::ensure_sufficient(&customer.id, customer.credit(), total).inspect_err(|_| {
        warn!(
            customer_id = %customer.id,
            required = %total,
            available = %customer.credit(),
            "Sale rejected: insufficient credit"
        )
    })?;

    let now = Utc::now();
    let record = SaleRecord {
        id: Uuid::new_v4().to_string(),
        sale_date: request.sale_date.unwrap_or(now),
        manager_id: manager_id.to_string(),
        customer_id: customer.id.clone(),
        billed_customer_id: customer.id.clone(),
        created_at: now,
        updated_at: now,
    };

    SaleRepository::insert_in(conn, &record).await?;
    PairRepository::attach_in(conn, &record.id, &mut pairs).await?;
    CreditLedger::debit(conn, &customer.id, total).await?;

    Ok(Sale::assemble(record, pairs)?)
}

async fn update_in(
    conn: &mut SqliteConnection,
    sale_id: &str,
    request: &SaleUpdate,
    policy: CustomerChangePolicy,
) -> EngineResult<Sale> {
    let mut new_pairs = LineItemBuilder::build(conn, &request.products).await?;

    let existing = SaleRepository::load_in(conn, sale_id).await?;
    let old_total = existing.total_price();
    let new_total = pricing::total_price(&new_pairs)?;

    // Credit always moves on whoever holds the debit, which can differ from
    // `customer_id` after an edit under `OriginalCustomer`.
    let billed = existing.billed_customer_id.as_str();
    let reassigned_to = match (policy, request.customer_id.as_deref()) {
        (CustomerChangePolicy::Reassign, Some(id)) if id != billed => Some(id),
        _ => None,
    };

    match reassigned_to {
        None => {
            let customer = UserRepository::fetch_in(conn, billed).await?;
            let headroom = rules::headroom(customer.credit(), old_total)?;

            rules::ensure_sufficient(&customer.id, headroom, new_total).inspect_err(|_| {
                warn!(
                    sale_id = %sale_id,
                    customer_id = %customer.id,
                    required = %new_total,
                    headroom = %headroom,
                    "Update rejected: insufficient credit"
                )
            })?;
        }
        Some(new_customer_id) => {
            // The billed customer must still exist to be refunded.
            UserRepository::fetch_in(conn, billed).await?;
            let new_customer = UserRepository::fetch_in(conn, new_customer_id).await?;

            rules::ensure_sufficient(&new_customer.id, new_customer.credit(), new_total)
                .inspect_err(|_| {
                    warn!(
                        sale_id = %sale_id,
                        customer_id = %new_customer.id,
                        required = %new_total,
                        available = %new_customer.credit(),
                        "Reassignment rejected: insufficient credit"
                    )
                })?;
        }
    }

    let superseded = PairRepository::remove_for_sale_in(conn, sale_id).await?;
    PairRepository::attach_in(conn, sale_id, &mut new_pairs).await?;
    SaleRepository::update_header_in(
        conn,
        sale_id,
        HeaderChange {
            sale_date: request.sale_date.unwrap_or_else(Utc::now),
            manager_id: request.manager_id.as_deref(),
            customer_id: request.customer_id.as_deref(),
            billed_customer_id: reassigned_to,
        },
    )
    .await?;

    match reassigned_to {
        None => {
            let delta = rules::reconciliation_delta(old_total, new_total)?;
            CreditLedger::adjust(conn, billed, delta).await?;
        }
        Some(new_customer_id) => {
            CreditLedger::credit(conn, billed, old_total).await?;
            CreditLedger::debit(conn, new_customer_id, new_total).await?;
        }
    }

    debug!(
        sale_id = %sale_id,
        superseded = superseded.len(),
        old_total = %old_total,
        new_total = %new_total,
        "Pairs replaced"
    );

    Ok(SaleRepository::load_in(conn, sale_id).await?)
}

async fn delete_in(
    conn: &mut SqliteConnection,
    records: &[SaleRecord],
    policy: DeletePolicy,
) -> EngineResult<u64> {
    let mut deleted = 0;

    for record in records {
        let removed = PairRepository::remove_for_sale_in(conn, &record.id).await?;
        if !SaleRepository::delete_in(conn, &record.id).await? {
            continue;
        }
        deleted += 1;

        if policy == DeletePolicy::Refund {
            let total = pricing::total_price(&removed)?;
            CreditLedger::credit(conn, &record.billed_customer_id, total).await?;
            debug!(
                sale_id = %record.id,
                customer_id = %record.billed_customer_id,
                refunded = %total,
                "Refunded deleted sale"
            );
        }
    }

    Ok(deleted)
}

// =============================================================================
// Unit Tests
// =============================================================================
