//! # Settlement Repository
//!
//! Immutable settlements and their inventory counts. There is no update path;
//! a trigger rejects any UPDATE on `settlements`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use pearl_core::{
    InventoryCount, InventoryCountInput, Settlement, SettlementSeed, SettlementSource,
};

const SETTLEMENT_COLUMNS: &str = r#"
    id, business_date, source, shift_id, device_id, total_orders,
    total_revenue_cents, total_discount_cents, net_revenue_cents,
    incentive_target, incentive_items_sold, incentive_achieved, notes, submitted_at
"#;

#[derive(Debug, FromRow)]
struct SettlementRow {
    id: String,
    business_date: NaiveDate,
    source: SettlementSource,
    shift_id: Option<String>,
    device_id: Option<String>,
    total_orders: i64,
    total_revenue_cents: i64,
    total_discount_cents: i64,
    net_revenue_cents: i64,
    incentive_target: Option<i64>,
    incentive_items_sold: Option<i64>,
    incentive_achieved: bool,
    notes: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl SettlementRow {
    fn into_settlement(self, inventory_counts: Vec<InventoryCount>) -> Settlement {
        Settlement {
            id: self.id,
            business_date: self.business_date,
            source: self.source,
            shift_id: self.shift_id,
            device_id: self.device_id,
            total_orders: self.total_orders,
            total_revenue_cents: self.total_revenue_cents,
            total_discount_cents: self.total_discount_cents,
            net_revenue_cents: self.net_revenue_cents,
            incentive_target: self.incentive_target,
            incentive_items_sold: self.incentive_items_sold,
            incentive_achieved: self.incentive_achieved,
            notes: self.notes,
            submitted_at: self.submitted_at,
            inventory_counts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettlementRepository {
    pool: SqlitePool,
}

impl SettlementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettlementRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Settlement>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_in(&mut conn, id).await
    }

    pub async fn get_by_id_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Settlement>> {
        let sql = format!("SELECT {SETTLEMENT_COLUMNS} FROM settlements WHERE id = ?");
        let row: Option<SettlementRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let counts = Self::counts_for(&mut *conn, &row.id).await?;
                Ok(Some(row.into_settlement(counts)))
            }
            None => Ok(None),
        }
    }

    /// Most recently submitted settlement for a business date.
    pub async fn latest_for_day(&self, day: NaiveDate) -> DbResult<Option<Settlement>> {
        let mut conn = self.pool.acquire().await?;
        let id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM settlements
            WHERE business_date = ?
            ORDER BY submitted_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(day)
        .fetch_optional(&mut *conn)
        .await?;

        match id {
            Some(id) => Self::get_by_id_in(&mut conn, &id).await,
            None => Ok(None),
        }
    }

    async fn counts_for(
        conn: &mut SqliteConnection,
        settlement_id: &str,
    ) -> DbResult<Vec<InventoryCount>> {
        let counts: Vec<InventoryCount> = sqlx::query_as(
            r#"
            SELECT id, settlement_id, product_id, product_name, quantity_remaining, quantity_sold
            FROM inventory_counts
            WHERE settlement_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(settlement_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(counts)
    }

    /// Inserts a settlement row built by the caller (shift close).
    /// `inventory_counts` on the struct are ignored; use [`Self::insert_counts`].
    pub async fn insert(conn: &mut SqliteConnection, settlement: &Settlement) -> DbResult<()> {
        let sql = format!(
            r#"
            INSERT INTO settlements ({SETTLEMENT_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#
        );
        sqlx::query(&sql)
            .bind(&settlement.id)
            .bind(settlement.business_date)
            .bind(settlement.source)
            .bind(settlement.shift_id.as_deref())
            .bind(settlement.device_id.as_deref())
            .bind(settlement.total_orders)
            .bind(settlement.total_revenue_cents)
            .bind(settlement.total_discount_cents)
            .bind(settlement.net_revenue_cents)
            .bind(settlement.incentive_target)
            .bind(settlement.incentive_items_sold)
            .bind(settlement.incentive_achieved)
            .bind(settlement.notes.as_deref())
            .bind(settlement.submitted_at)
            .execute(&mut *conn)
            .await?;

        debug!(settlement_id = %settlement.id, source = ?settlement.source, "Settlement inserted");
        Ok(())
    }

    /// Inserts a manual settlement whose totals are computed from the
    /// day's completed orders by the same statement.
    ///
    /// The scan and the insert being one statement means no order committed
    /// between them can be missed or double counted.
    pub async fn insert_from_orders(
        conn: &mut SqliteConnection,
        id: &str,
        day: NaiveDate,
        seed: &SettlementSeed,
        submitted_at: DateTime<Utc>,
    ) -> DbResult<Settlement> {
        sqlx::query(
            r#"
            INSERT INTO settlements (
                id, business_date, source, shift_id, device_id, total_orders,
                total_revenue_cents, total_discount_cents, net_revenue_cents,
                incentive_target, incentive_items_sold, incentive_achieved, notes, submitted_at
            )
            SELECT
                ?1, ?2, ?3, NULL, ?4,
                COUNT(*),
                COALESCE(SUM(subtotal_cents), 0),
                COALESCE(SUM(discount_cents), 0),
                COALESCE(SUM(subtotal_cents), 0) - COALESCE(SUM(discount_cents), 0),
                ?5, ?6, ?7, ?8, ?9
            FROM orders
            WHERE business_date = ?2 AND status = 'completed'
            "#,
        )
        .bind(id)
        .bind(day)
        .bind(SettlementSource::Manual)
        .bind(seed.device_id.as_deref())
        .bind(seed.incentive_target)
        .bind(seed.incentive_items_sold)
        .bind(seed.incentive_achieved())
        .bind(seed.notes.as_deref())
        .bind(submitted_at)
        .execute(&mut *conn)
        .await?;

        Self::get_by_id_in(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Settlement", id))
    }

    /// Writes inventory counts for a settlement and returns them as stored.
    pub async fn insert_counts(
        conn: &mut SqliteConnection,
        settlement_id: &str,
        counts: &[InventoryCountInput],
    ) -> DbResult<Vec<InventoryCount>> {
        let mut stored = Vec::with_capacity(counts.len());
        for input in counts {
            let count = InventoryCount {
                id: Uuid::new_v4().to_string(),
                settlement_id: settlement_id.to_string(),
                product_id: input.product_id.clone(),
                product_name: input.product_name.clone(),
                quantity_remaining: input.quantity_remaining,
                quantity_sold: input.quantity_sold,
            };
            sqlx::query(
                r#"
                INSERT INTO inventory_counts (
                    id, settlement_id, product_id, product_name, quantity_remaining, quantity_sold
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&count.id)
            .bind(&count.settlement_id)
            .bind(&count.product_id)
            .bind(&count.product_name)
            .bind(count.quantity_remaining)
            .bind(count.quantity_sold)
            .execute(&mut *conn)
            .await?;
            stored.push(count);
        }
        Ok(stored)
    }
}
