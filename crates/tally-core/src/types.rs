//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │      User       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name           │   │  sale_date      │   │  name, role     │       │
//! │  │  price_cents    │   │  manager_id ────┼──►│  credit_cents   │       │
//! │  └────────▲────────┘   │  customer_id ───┼──►└─────────────────┘       │
//! │           │            │  products[]     │                             │
//! │  ┌────────┴────────┐   │  total (derived)│                             │
//! │  │      Pair       │◄──┤                 │                             │
//! │  │  unit_price     │   └─────────────────┘                             │
//! │  │  (frozen)       │                                                    │
//! │  │  quantity > 0   │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationResult;
use crate::money::Money;
use crate::pricing;

// =============================================================================
// Users
// =============================================================================

/// Role of a user account.
///
/// The engine does not authorize by role; it is carried for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Buys on credit.
    #[default]
    Customer,
    /// Records and edits sales.
    Manager,
}

/// A user account. Customers carry the credit balance sales are debited from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    /// Available prepaid balance in cents. Signed.
    pub credit_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[inline]
    pub fn credit(&self) -> Money {
        Money::from_cents(self.credit_cents)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale. Read-only from the engine's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Current authoritative unit price in cents.
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Pair (line item)
// =============================================================================

/// One product line of a sale.
///
/// Uses the snapshot pattern: `unit_price_cents` is copied from the product
/// when the pair is created and never re-read, so historical sales stay
/// priced at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Pair {
    pub id: String,
    /// Owning sale. `None` while the pair is staged and not yet committed.
    pub sale_id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Index in the request the pair was built from.
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl Pair {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// `unit_price × quantity`, or `None` on overflow.
    #[inline]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price().checked_mul(self.quantity)
    }
}

/// A requested product line: which product, how many.
///
/// Accepts `productId` or `product` for the id, like the request layer sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    #[serde(alias = "productId", alias = "product")]
    pub product_id: String,
    pub quantity: i64,
}

impl ItemRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        ItemRequest {
            product_id: product_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// The stored columns of a sale, without its pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleRecord {
    pub id: String,
    pub sale_date: DateTime<Utc>,
    pub manager_id: String,
    pub customer_id: String,
    /// Whose credit carries this sale's debit. Equal to `customer_id` unless
    /// an edit renamed the customer without moving the charge.
    pub billed_customer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A billed transaction from a manager to a customer.
///
/// The pairs and the total are only reachable through [`Sale::assemble`],
/// so `total_price_cents` always equals the priced sum of `products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    pub id: String,
    pub sale_date: DateTime<Utc>,
    pub manager_id: String,
    pub customer_id: String,
    pub billed_customer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    products: Vec<Pair>,
    total_price_cents: i64,
}

impl Sale {
    /// Builds a sale from its stored record and pairs, pricing the pairs.
    pub fn assemble(record: SaleRecord, mut products: Vec<Pair>) -> ValidationResult<Self> {
        products.sort_by_key(|p| p.position);
        let total = pricing::total_price(&products)?;

        Ok(Sale {
            id: record.id,
            sale_date: record.sale_date,
            manager_id: record.manager_id,
            customer_id: record.customer_id,
            billed_customer_id: record.billed_customer_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            products,
            total_price_cents: total.cents(),
        })
    }

    /// Pairs in request order.
    pub fn products(&self) -> &[Pair] {
        &self.products
    }

    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Input for recording a new sale.
///
/// `manager_id` falls back to the acting user when absent; `sale_date`
/// falls back to the time the sale is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    #[serde(default)]
    pub sale_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manager_id: Option<String>,
    pub customer_id: String,
    #[serde(alias = "items")]
    pub products: Vec<ItemRequest>,
}

impl NewSale {
    pub fn new(customer_id: impl Into<String>, products: Vec<ItemRequest>) -> Self {
        NewSale {
            sale_date: None,
            manager_id: None,
            customer_id: customer_id.into(),
            products,
        }
    }
}

/// Input for editing a sale. The product lines replace the old ones wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleUpdate {
    /// Defaults to now, like a new sale.
    #[serde(default)]
    pub sale_date: Option<DateTime<Utc>>,
    /// `None` keeps the stored manager.
    #[serde(default)]
    pub manager_id: Option<String>,
    /// `None` keeps the stored customer.
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(alias = "items")]
    pub products: Vec<ItemRequest>,
}

impl SaleUpdate {
    pub fn new(products: Vec<ItemRequest>) -> Self {
        SaleUpdate {
            sale_date: None,
            manager_id: None,
            customer_id: None,
            products,
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Match criteria for finding or deleting sales. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilter {
    pub id: Option<String>,
    pub customer_id: Option<String>,
    pub manager_id: Option<String>,
    /// Inclusive lower bound on `sale_date`.
    pub sold_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `sale_date`.
    pub sold_before: Option<DateTime<Utc>>,
}

impl SaleFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        SaleFilter {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_customer(customer_id: impl Into<String>) -> Self {
        SaleFilter {
            customer_id: Some(customer_id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.customer_id.is_none()
            && self.manager_id.is_none()
            && self.sold_after.is_none()
            && self.sold_before.is_none()
    }
}

/// Which related entities to load alongside sales for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleExpansion {
    pub manager: bool,
    pub customer: bool,
    /// Resolve each pair's product.
    pub products: bool,
}

impl SaleExpansion {
    /// Expand everything (heavy).
    pub const fn all() -> Self {
        SaleExpansion {
            manager: true,
            customer: true,
            products: true,
        }
    }

    pub const fn none() -> Self {
        SaleExpansion {
            manager: false,
            customer: false,
            products: false,
        }
    }
}

/// A pair with its product resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductLine {
    pub pair: Pair,
    pub product: Product,
}

/// A sale with the relations requested by a [`SaleExpansion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleView {
    pub sale: Sale,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<ProductLine>>,
}

impl SaleView {
    pub fn bare(sale: Sale) -> Self {
        SaleView {
            sale,
            manager: None,
            customer: None,
            lines: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
