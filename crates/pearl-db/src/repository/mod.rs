//! # Repository Module
//!
//! Database repositories, one per table group.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pearl-ledger service                                                   │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                                │
//! │       │  SequenceRepository::ensure_day(&mut tx, day, 125, now).await?; │
//! │       │  OrderRepository::insert(&mut tx, &order).await?;               │
//! │       │  tx.commit().await?;                                            │
//! │       ▼                                                                 │
//! │  Repositories own the SQL; services own the transaction boundaries.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`order::OrderRepository`] - Orders, lines, stats, retry-key lookup
//! - [`sequence::SequenceRepository`] - Per-day order counters
//! - [`material::MaterialRepository`] - Materials and cached balances
//! - [`recipe::RecipeRepository`] - Product → material recipe rows
//! - [`stock_record::StockRecordRepository`] - Append-only stock ledger
//! - [`alert::AlertRepository`] - Low-stock alerts
//! - [`shift::ShiftRepository`] - Shifts and running totals
//! - [`settlement::SettlementRepository`] - Settlements and inventory counts

pub mod alert;
pub mod material;
pub mod order;
pub mod recipe;
pub mod sequence;
pub mod settlement;
pub mod shift;
pub mod stock_record;

/// Default page size for list queries without an explicit limit.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Upper bound on any list page.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Clamps caller-supplied paging to sane values.
pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{Database, DbConfig};

    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }
}
