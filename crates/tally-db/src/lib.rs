//! # tally-db: Database Layer for Tally
//!
//! SQLite persistence for users, products, sales and their pairs, using
//! sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  SaleEngine (tally-engine)                                             │
//! │       │ one Transaction per create / update / delete                   │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ UserRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ProductRepo   │    │ 001_init.sql │  │   │
//! │  │   │ begin()       │    │ PairRepo      │    │              │  │   │
//! │  │   │               │    │ SaleRepo      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL) or :memory: in tests                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//!
//! // Reads go straight to a repository
//! let sales = db.sales().find(&SaleFilter::by_customer(&customer_id)).await?;
//!
//! // Writes share a transaction
//! let mut tx = db.begin().await?;
//! let pair = PairRepository::stage_in(&mut tx, &product_id, 2, 0).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::pair::PairRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::{HeaderChange, SaleRepository};
pub use repository::user::{CreditChange, UserRepository};
