//! Engine configuration.
//!
//! Loaded from environment variables with fallback to defaults.
//!
//! | Variable                       | Default             |
//! |--------------------------------|---------------------|
//! | `TALLY_MAX_ITEMS_PER_SALE`     | 100                 |
//! | `TALLY_MAX_ITEM_QUANTITY`      | 9999                |
//! | `TALLY_DELETE_POLICY`          | `retain`            |
//! | `TALLY_CUSTOMER_CHANGE_POLICY` | `original_customer` |

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tally_core::validation::SaleLimits;
use tally_core::{DEFAULT_MAX_ITEMS_PER_SALE, DEFAULT_MAX_ITEM_QUANTITY};

/// What deleting a sale does to its customer's credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Sales are an append-only ledger: the debit stands.
    #[default]
    Retain,
    /// The customer is credited with the deleted sale's total.
    Refund,
}

/// How an update that names a different customer settles credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerChangePolicy {
    /// Reconcile against the customer stored on the sale; the new customer
    /// is recorded but not charged.
    #[default]
    OriginalCustomer,
    /// Refund the old total to the original customer and charge the new
    /// total to the new one.
    Reassign,
}

impl FromStr for DeletePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(DeletePolicy::Retain),
            "refund" => Ok(DeletePolicy::Refund),
            _ => Err(()),
        }
    }
}

impl FromStr for CustomerChangePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original_customer" | "original" => Ok(CustomerChangePolicy::OriginalCustomer),
            "reassign" => Ok(CustomerChangePolicy::Reassign),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletePolicy::Retain => write!(f, "retain"),
            DeletePolicy::Refund => write!(f, "refund"),
        }
    }
}

/// Sale engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Max product lines per sale
    pub max_items_per_sale: usize,

    /// Max quantity on one product line
    pub max_item_quantity: i64,

    pub delete_policy: DeletePolicy,

    pub customer_change_policy: CustomerChangePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_items_per_sale: DEFAULT_MAX_ITEMS_PER_SALE,
            max_item_quantity: DEFAULT_MAX_ITEM_QUANTITY,
            delete_policy: DeletePolicy::default(),
            customer_change_policy: CustomerChangePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            max_items_per_sale: parse_or(
                &lookup,
                "TALLY_MAX_ITEMS_PER_SALE",
                defaults.max_items_per_sale,
            )?,
            max_item_quantity: parse_or(
                &lookup,
                "TALLY_MAX_ITEM_QUANTITY",
                defaults.max_item_quantity,
            )?,
            delete_policy: parse_or(&lookup, "TALLY_DELETE_POLICY", defaults.delete_policy)?,
            customer_change_policy: parse_or(
                &lookup,
                "TALLY_CUSTOMER_CHANGE_POLICY",
                defaults.customer_change_policy,
            )?,
        };

        if config.max_items_per_sale == 0 {
            return Err(ConfigError::InvalidValue(
                "TALLY_MAX_ITEMS_PER_SALE".to_string(),
            ));
        }
        if config.max_item_quantity <= 0 {
            return Err(ConfigError::InvalidValue(
                "TALLY_MAX_ITEM_QUANTITY".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn with_customer_change_policy(mut self, policy: CustomerChangePolicy) -> Self {
        self.customer_change_policy = policy;
        self
    }

    /// Request-size limits applied before any write.
    pub fn limits(&self) -> SaleLimits {
        SaleLimits {
            max_items: self.max_items_per_sale,
            max_item_quantity: self.max_item_quantity,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
