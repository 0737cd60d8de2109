//! # tally-core: Pure Business Logic for Tally
//!
//! Domain types and rules for credit sales, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Request layer (not in this workspace)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-engine                                 │   │
//! │  │    create_sale, update_sale, delete_sales, find_sales           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │  Sale     │  │   Money   │  │  credit   │  │   rules   │  │   │
//! │  │   │  Pair     │  │           │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, User, Pair, Sale, queries)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Sale total calculation
//! - [`credit`] - Credit sufficiency and reconciliation rules
//! - [`error`] - Domain error types
//! - [`validation`] - Request validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::credit;
//! use tally_core::money::Money;
//!
//! let credit = Money::from_cents(10_000);
//! let total = Money::from_cents(8_000);
//!
//! assert!(credit::is_sufficient(credit, total));
//! assert_eq!((credit - total).cents(), 2_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credit;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum product lines in a single sale.
///
/// ## Business Reason
/// Bounds the work done inside one sale transaction.
pub const DEFAULT_MAX_ITEMS_PER_SALE: usize = 100;

/// Maximum quantity on a single product line.
///
/// ## Business Reason
/// Catches typos (10000 instead of 10) before credit is debited.
pub const DEFAULT_MAX_ITEM_QUANTITY: i64 = 9999;
