//! Embedded schema migrations.
//!
//! SQL lives in the workspace `migrations/sqlite/` directory and is compiled
//! into the binary. Add a new `NNN_description.sql` file for every schema
//! change; applied files must never be edited, since sqlx checksums them.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies pending migrations in filename order. Safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(count = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await?;

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
