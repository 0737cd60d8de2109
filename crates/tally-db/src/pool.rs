//! # Connection Pool
//!
//! Opens the SQLite database, applies migrations and hands out repositories
//! and transactions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DbConfig ──► Database::new ──► SqlitePool (WAL, foreign_keys=ON)       │
//! │                    │                                                    │
//! │                    ├── db.users() / db.products() / db.sales() ...      │
//! │                    │     reads, one pooled connection per call          │
//! │                    │                                                    │
//! │                    └── db.begin() ──► Transaction<'static, Sqlite>      │
//! │                          every write of one engine operation           │
//! │                          dropped without commit ⇒ rolled back          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Foreign keys are what turn a sale with an unknown manager into an error
//! rather than a dangling row; SQLite leaves them off unless asked.
//! Concurrent writers wait up to `busy_timeout` for the write lock.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::pair::PairRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::user::UserRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ```rust,ignore
/// let config = DbConfig::new("./tally.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file; created on first connect. `:memory:` for tests.
    pub database_path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// How long `acquire` waits for a free connection. Default: 30s
    pub acquire_timeout: Duration,

    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a writer waits for SQLite's write lock. Default: 5s
    pub busy_timeout: Duration,

    /// Default: true
    pub run_migrations: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig::new("./tally.db")
    }
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Private in-memory database. One connection, since each SQLite
    /// connection to `:memory:` would otherwise see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(":memory:")
        }
    }

    /// Reads overrides from the environment.
    ///
    /// | Variable                   | Field             |
    /// |----------------------------|-------------------|
    /// | `TALLY_DATABASE_PATH`      | `database_path`   |
    /// | `TALLY_DB_MAX_CONNECTIONS` | `max_connections` |
    /// | `TALLY_DB_BUSY_TIMEOUT_MS` | `busy_timeout`    |
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`DbConfig::from_env`] over any key/value source.
    pub fn from_lookup<F>(lookup: F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = DbConfig::default();

        if let Some(path) = lookup("TALLY_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("TALLY_DB_MAX_CONNECTIONS") {
            config.max_connections = raw
                .trim()
                .parse()
                .ok()
                .filter(|n: &u32| *n > 0)
                .ok_or_else(|| DbError::InvalidConfig("TALLY_DB_MAX_CONNECTIONS".to_string()))?;
        }
        if let Some(raw) = lookup("TALLY_DB_BUSY_TIMEOUT_MS") {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|_| DbError::InvalidConfig("TALLY_DB_BUSY_TIMEOUT_MS".to_string()))?;
            config.busy_timeout = Duration::from_millis(millis);
        }

        config.min_connections = config.min_connections.min(config.max_connections);
        Ok(config)
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the pool. Clones share it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects and, unless disabled, migrates.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", config.database_path.display()))
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .foreign_keys(true)
                .busy_timeout(config.busy_timeout);

        debug!(busy_timeout = ?config.busy_timeout, "Connect options ready");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Database pool ready");

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a transaction. Dropping it without `commit` rolls it back.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn pairs(&self) -> PairRepository {
        PairRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_file_database_enforces_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("fk.db")))
            .await
            .unwrap();

        let result = sqlx::query(
            "INSERT INTO sales (id, sale_date, manager_id, customer_id, billed_customer_id,
                                created_at, updated_at)
             VALUES ('s1', '2024-01-01', 'nobody', 'nobody', 'nobody',
                     '2024-01-01', '2024-01-01')",
        )
        .execute(db.pool())
        .await;

        assert!(matches!(
            result.map_err(DbError::from),
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("TALLY_DATABASE_PATH", "/var/lib/tally/tally.db"),
            ("TALLY_DB_MAX_CONNECTIONS", "8"),
            ("TALLY_DB_BUSY_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();

        let config = DbConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/tally/tally.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));

        let bad = DbConfig::from_lookup(|k| (k == "TALLY_DB_MAX_CONNECTIONS").then(|| "0".to_string()));
        assert!(matches!(bad, Err(DbError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            sqlx::query(
                "INSERT INTO products (id, name, price_cents, created_at, updated_at)
                 VALUES ('p1', 'Flour', 100, '2024-01-01', '2024-01-01')",
            )
            .execute(&mut *tx)
            .await
            .unwrap();
        }

        assert!(db.products().get_by_id("p1").await.unwrap().is_none());
    }
}
