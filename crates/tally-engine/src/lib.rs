//! # tally-engine: Sale Transaction Engine
//!
//! Records credit sales: builds priced pairs, checks the customer's credit,
//! and commits the sale together with the debit, or leaves nothing behind.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  request layer (out of crate)                                          │
//! │       │ NewSale / SaleUpdate / SaleFilter                              │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │ SaleEngine (engine.rs)                                            │ │
//! │  │   LockManager ── per-customer / per-sale scopes                   │ │
//! │  │   LineItemBuilder ── stage pairs, prices frozen                   │ │
//! │  │   pricing::total_price (tally-core)                               │ │
//! │  │   CreditLedger ── check / debit / credit / adjust                 │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │       │ one Transaction per operation                                   │
//! │       ▼                                                                 │
//! │  tally-db repositories                                                 │
//! │                                                                         │
//! │  Reads (get_sale, find_sales) go straight to the repositories.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use tally_engine::{EngineConfig, SaleEngine};
//!
//! let engine = SaleEngine::new(db, EngineConfig::from_env()?);
//! let sale = engine
//!     .create_sale(&session_user_id, NewSale::new(&customer_id, items))
//!     .await?;
//! ```

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod locks;

pub use builder::LineItemBuilder;
pub use config::{ConfigError, CustomerChangePolicy, DeletePolicy, EngineConfig};
pub use engine::SaleEngine;
pub use error::{EngineError, EngineResult, ErrorCode, ErrorResponse};
pub use ledger::CreditLedger;
pub use locks::{LockManager, LockScope};
