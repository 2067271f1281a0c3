//! # Shift Repository
//!
//! Shifts and their running totals.
//!
//! ## Shift Lifecycle
//! ```text
//!   insert()            accumulate() × N             close()
//!  ──────────▶  OPEN  ──────────────────▶  OPEN  ──────────────▶  CLOSED
//!                                                  (settlement_id set)
//! ```
//!
//! The "one open shift per device" rule lives in a partial unique index on
//! `IFNULL(device_id, '')`, so a missing device id behaves like one more
//! device rather than escaping the rule.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use pearl_core::{Shift, ShiftStatus};

const SHIFT_COLUMNS: &str = r#"
    id, device_id, status, opened_at, closed_at, total_orders,
    total_revenue_cents, total_discount_cents, net_revenue_cents, settlement_id
"#;

#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Inserts a new shift.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when the device already has an open shift.
    pub async fn insert(&self, shift: &Shift) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shifts (
                id, device_id, status, opened_at, closed_at, total_orders,
                total_revenue_cents, total_discount_cents, net_revenue_cents,
                settlement_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&shift.id)
        .bind(shift.device_id.as_deref())
        .bind(shift.status)
        .bind(shift.opened_at)
        .bind(shift.closed_at)
        .bind(shift.total_orders)
        .bind(shift.total_revenue_cents)
        .bind(shift.total_discount_cents)
        .bind(shift.net_revenue_cents)
        .bind(shift.settlement_id.as_deref())
        .bind(shift.opened_at)
        .execute(&self.pool)
        .await?;

        debug!(shift_id = %shift.id, device_id = ?shift.device_id, "Shift inserted");
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_in(&mut conn, id).await
    }

    pub async fn get_by_id_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Shift>> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?");
        let shift: Option<Shift> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(shift)
    }

    pub async fn find_open_for_device(&self, device_id: Option<&str>) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_open_for_device_in(&mut conn, device_id).await
    }

    /// The open shift of a device; `None` matches the shift opened without one.
    pub async fn find_open_for_device_in(
        conn: &mut SqliteConnection,
        device_id: Option<&str>,
    ) -> DbResult<Option<Shift>> {
        let sql = format!(
            r#"
            SELECT {SHIFT_COLUMNS}
            FROM shifts
            WHERE status = 'open' AND IFNULL(device_id, '') = IFNULL(?1, '')
            "#
        );
        let shift: Option<Shift> = sqlx::query_as(&sql)
            .bind(device_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(shift)
    }

    /// Takes the write lock on a shift row. Returns `false` if it does not exist.
    pub async fn lock(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let touched = sqlx::query("UPDATE shifts SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        Ok(touched > 0)
    }

    /// Adds one order to an open shift's totals.
    ///
    /// Returns 0 when the shift is closed (or missing); the order is then
    /// simply not counted.
    pub async fn accumulate(
        conn: &mut SqliteConnection,
        id: &str,
        revenue_cents: i64,
        discount_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET total_orders = total_orders + 1,
                total_revenue_cents = total_revenue_cents + ?1,
                total_discount_cents = total_discount_cents + ?2,
                net_revenue_cents = net_revenue_cents + (?1 - ?2),
                updated_at = ?3
            WHERE id = ?4 AND status = 'open'
            "#,
        )
        .bind(revenue_cents)
        .bind(discount_cents)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Marks an open shift closed and links its settlement.
    pub async fn close(
        conn: &mut SqliteConnection,
        id: &str,
        closed_at: DateTime<Utc>,
        settlement_id: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET status = ?1, closed_at = ?2, settlement_id = ?3, updated_at = ?2
            WHERE id = ?4 AND status = 'open'
            "#,
        )
        .bind(ShiftStatus::Closed)
        .bind(closed_at)
        .bind(settlement_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }
}
