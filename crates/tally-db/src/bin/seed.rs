//! # Seed Data Generator
//!
//! Populates a database with a small catalog, managers and customers for
//! development against the sale engine.
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path and number of customers
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --customers 50
//! ```
//!
//! Log output follows `RUST_LOG` (default `info`). Pool settings come from
//! the `TALLY_DB_*` variables; `--db` wins over `TALLY_DATABASE_PATH`.

use std::env;

use tally_core::UserRole;
use tally_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Catalog entries: name and unit price in cents.
const PRODUCTS: &[(&str, i64)] = &[
    ("Sugar 50kg", 4000),
    ("Rice 25kg", 3250),
    ("Flour 25kg", 2199),
    ("Cooking Oil 20L", 5400),
    ("Salt 10kg", 650),
    ("Tea 5kg", 1000),
    ("Coffee 5kg", 2875),
    ("Milk Powder 10kg", 4599),
    ("Beans 25kg", 2900),
    ("Pasta 12x500g", 1299),
];

const MANAGERS: &[&str] = &["Grace Hopper", "Barbara Liskov"];

/// Opening balance per customer, cycled.
const OPENING_CREDIT_CENTS: &[i64] = &[10_000, 25_000, 50_000, 100_000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config = DbConfig::from_env()?;
    let mut customers: usize = 20;
    let mut db_path =
        env::var("TALLY_DATABASE_PATH").unwrap_or_else(|_| "./tally_dev.db".to_string());

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--customers" | "-c" => {
                if i + 1 < args.len() {
                    customers = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --customers <N>  Number of customers to create (default: 20)");
                println!("  -d, --db <PATH>      Database file path (default: ./tally_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    config.database_path = db_path.clone().into();
    let db = Database::new(config).await?;
    info!(path = %db_path, "Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(
            products = existing,
            "Database already seeded; delete the file to regenerate"
        );
        return Ok(());
    }

    for (name, price_cents) in PRODUCTS {
        db.products().create(name, *price_cents).await?;
    }
    info!(count = PRODUCTS.len(), "Seeded products");

    for name in MANAGERS {
        let manager = db.users().create(name, UserRole::Manager, 0).await?;
        info!(id = %manager.id, name = %manager.name, "Seeded manager");
    }

    for n in 0..customers {
        let credit = OPENING_CREDIT_CENTS[n % OPENING_CREDIT_CENTS.len()];
        db.users()
            .create(&format!("Customer {:03}", n + 1), UserRole::Customer, credit)
            .await?;
    }
    info!(count = customers, "Seeded customers");

    db.close().await;
    Ok(())
}
