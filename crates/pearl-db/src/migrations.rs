//! # Schema Migrations
//!
//! ```text
//! migrations/
//! ├── 001_orders_and_sequences.sql   orders, order_lines, daily_sequences
//! ├── 002_inventory.sql              materials, recipes, stock_records, alerts
//! └── 003_shifts_and_settlements.sql shifts, settlements, inventory_counts
//! ```
//!
//! Applied files are checksummed by sqlx; schema changes go in a new file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Applies pending migrations in filename order. Safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(known = MIGRATOR.migrations.len(), "Applying ledger schema migrations");
    MIGRATOR.run(pool).await?;
    info!("Ledger schema up to date");
    Ok(())
}

/// `(known, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let known = MIGRATOR.migrations.len();

    // The bookkeeping table only exists once a migration has run
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    Ok((known, applied as usize))
}
