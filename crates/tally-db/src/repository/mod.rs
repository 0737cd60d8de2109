//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool-level (methods on &self)         Transaction-level (fn(conn, ..))│
//! │  ─────────────────────────────         ──────────────────────────────  │
//! │  db.sales().find(&filter)              SaleRepository::insert_in(      │
//! │  db.products().get_by_id(id)               &mut tx, &record)           │
//! │                                                                         │
//! │  Reads for display; each call          Writes for one sale operation;  │
//! │  takes its own connection.             all share the caller's          │
//! │                                        transaction and commit together.│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog and prices
//! - [`UserRepository`](user::UserRepository) - Users and credit balances
//! - [`PairRepository`](pair::PairRepository) - Staged and committed line items
//! - [`SaleRepository`](sale::SaleRepository) - Sale headers, lookup, expansion

/// Ids bound per `IN (...)` query. SQLite caps a statement at 32766
/// parameters; batches stay well below it.
pub(crate) const IN_CLAUSE_CHUNK: usize = 500;

pub mod pair;
pub mod product;
pub mod sale;
pub mod user;
