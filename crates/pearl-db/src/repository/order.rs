//! # Order Repository
//!
//! Database operations for orders and order lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. INSERT (inside the intake transaction)                              │
//! │     └── insert() → orders row + order_lines rows                        │
//! │                                                                         │
//! │  2. (OPTIONAL) CANCEL                                                   │
//! │     └── cancel() → status 'completed' → 'cancelled'                     │
//! │                                                                         │
//! │  Lines are never updated (enforced by trigger).                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::page;
use pearl_core::{
    Addon, AppliedDiscount, DiscountKind, Order, OrderFilter, OrderLine, OrderStats, OrderStatus,
    PaymentMethod,
};

// =============================================================================
// Row Types
// =============================================================================

const ORDER_COLUMNS: &str = r#"
    id, sequence, order_code, ordered_at, business_date,
    subtotal_cents, discount_kind, discount_value, discount_cents, total_cents,
    status, payment_method, customer_segment, device_id, shift_id,
    created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    sequence: i64,
    order_code: String,
    ordered_at: DateTime<Utc>,
    business_date: NaiveDate,
    subtotal_cents: i64,
    discount_kind: DiscountKind,
    discount_value: i64,
    discount_cents: i64,
    total_cents: i64,
    status: OrderStatus,
    payment_method: PaymentMethod,
    customer_segment: Option<String>,
    device_id: Option<String>,
    shift_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            sequence: self.sequence,
            order_code: self.order_code,
            ordered_at: self.ordered_at,
            business_date: self.business_date,
            lines,
            subtotal_cents: self.subtotal_cents,
            discount: AppliedDiscount {
                kind: self.discount_kind,
                value: self.discount_value,
                amount_cents: self.discount_cents,
            },
            total_cents: self.total_cents,
            status: self.status,
            payment_method: self.payment_method,
            customer_segment: self.customer_segment,
            device_id: self.device_id,
            shift_id: self.shift_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderLineRow {
    id: String,
    order_id: String,
    product_id: String,
    name_snapshot: String,
    unit_price_cents: i64,
    quantity: i64,
    addons_json: String,
    subtotal_cents: i64,
    position: i64,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = crate::error::DbError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        let addons: Vec<Addon> = serde_json::from_str(&row.addons_json)?;
        Ok(OrderLine {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            name_snapshot: row.name_snapshot,
            unit_price_cents: row.unit_price_cents,
            quantity: row.quantity,
            addons,
            subtotal_cents: row.subtotal_cents,
            position: row.position,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_in(&mut conn, id).await
    }

    /// Gets an order with its lines on an existing connection.
    pub async fn get_by_id_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let lines = Self::lines_for(&mut *conn, &row.id).await?;
                Ok(Some(row.into_order(lines)))
            }
            None => Ok(None),
        }
    }

    async fn lines_for(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let rows: Vec<OrderLineRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, product_id, name_snapshot, unit_price_cents,
                   quantity, addons_json, subtotal_cents, position
            FROM order_lines
            WHERE order_id = ?
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(OrderLine::try_from).collect()
    }

    /// Lists orders, newest first.
    ///
    /// Every filter field is optional; `NULL` parameters disable their clause.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let (limit, offset) = page(filter.limit, filter.offset);
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE (?1 IS NULL OR business_date >= ?1)
              AND (?2 IS NULL OR business_date <= ?2)
              AND (?3 IS NULL OR status = ?3)
              AND (?4 IS NULL OR device_id = ?4)
              AND (?5 IS NULL OR shift_id = ?5)
            ORDER BY ordered_at DESC, sequence DESC
            LIMIT ?6 OFFSET ?7
            "#
        );

        let mut conn = self.pool.acquire().await?;
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.status)
            .bind(filter.device_id.as_deref())
            .bind(filter.shift_id.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = Self::lines_for(&mut conn, &row.id).await?;
            orders.push(row.into_order(lines));
        }
        Ok(orders)
    }

    /// Counters for one business day. Revenue sums completed orders only.
    pub async fn stats_for_day(&self, day: NaiveDate) -> DbResult<OrderStats> {
        let stats: OrderStats = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_orders,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed_orders,
                COALESCE(SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END), 0) AS cancelled_orders,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN total_cents ELSE 0 END), 0) AS total_revenue_cents
            FROM orders
            WHERE business_date = ?
            "#,
        )
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Sequences issued for `day`, ascending.
    pub async fn sequences_for_day(&self, day: NaiveDate) -> DbResult<Vec<i64>> {
        let sequences: Vec<i64> = sqlx::query_scalar(
            "SELECT sequence FROM orders WHERE business_date = ? ORDER BY sequence",
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;
        Ok(sequences)
    }

    /// Looks up an order by its offline retry key.
    pub async fn find_id_by_retry_key(
        conn: &mut SqliteConnection,
        device_id: &str,
        ordered_at: DateTime<Utc>,
    ) -> DbResult<Option<String>> {
        let id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE device_id = ? AND ordered_at = ?",
        )
        .bind(device_id)
        .bind(ordered_at)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(id)
    }

    /// Inserts an order and its lines.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` on a duplicate retry key or a duplicate
    /// `(business_date, sequence)`.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, sequence = order.sequence, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, sequence, order_code, ordered_at, business_date,
                subtotal_cents, discount_kind, discount_value, discount_cents, total_cents,
                status, payment_method, customer_segment, device_id, shift_id,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15,
                ?16, ?17
            )
            "#,
        )
        .bind(&order.id)
        .bind(order.sequence)
        .bind(&order.order_code)
        .bind(order.ordered_at)
        .bind(order.business_date)
        .bind(order.subtotal_cents)
        .bind(order.discount.kind)
        .bind(order.discount.value)
        .bind(order.discount.amount_cents)
        .bind(order.total_cents)
        .bind(order.status)
        .bind(order.payment_method)
        .bind(order.customer_segment.as_deref())
        .bind(order.device_id.as_deref())
        .bind(order.shift_id.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        for line in &order.lines {
            let addons_json = serde_json::to_string(&line.addons)?;
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    id, order_id, product_id, name_snapshot, unit_price_cents,
                    quantity, addons_json, subtotal_cents, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&line.id)
            .bind(&line.order_id)
            .bind(&line.product_id)
            .bind(&line.name_snapshot)
            .bind(line.unit_price_cents)
            .bind(line.quantity)
            .bind(addons_json)
            .bind(line.subtotal_cents)
            .bind(line.position)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Moves a completed order to cancelled.
    ///
    /// ## Returns
    /// Number of rows changed: 0 when the order is unknown or not completed.
    pub async fn cancel(&self, id: &str, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'cancelled', updated_at = ?1
            WHERE id = ?2 AND status = 'completed'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::memory_db;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn order(id: &str, sequence: i64, device: Option<&str>, status: OrderStatus, total: i64) -> Order {
        let ordered_at = DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + chrono::Duration::seconds(sequence);
        Order {
            id: id.to_string(),
            sequence,
            order_code: format!("#{sequence:04}"),
            ordered_at,
            business_date: day(),
            lines: vec![OrderLine {
                id: format!("{id}-l0"),
                order_id: id.to_string(),
                product_id: "milk-tea".to_string(),
                name_snapshot: "Milk tea".to_string(),
                unit_price_cents: total,
                quantity: 1,
                addons: vec![Addon {
                    name: "Pearls".to_string(),
                    price_cents: 0,
                }],
                subtotal_cents: total,
                position: 0,
            }],
            subtotal_cents: total,
            discount: AppliedDiscount::default(),
            total_cents: total,
            status,
            payment_method: PaymentMethod::Cash,
            customer_segment: None,
            device_id: device.map(str::to_string),
            shift_id: None,
            created_at: ordered_at,
            updated_at: ordered_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let db = memory_db().await;
        let original = order("o1", 126, Some("A"), OrderStatus::Completed, 6500);

        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &original).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = db.orders().get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(db.orders().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retry_key_unique_and_lookup() {
        let db = memory_db().await;
        let first = order("o1", 126, Some("A"), OrderStatus::Completed, 100);
        let mut retry = order("o2", 127, Some("A"), OrderStatus::Completed, 100);
        retry.ordered_at = first.ordered_at;

        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &first).await.unwrap();
        let found = OrderRepository::find_id_by_retry_key(&mut tx, "A", first.ordered_at)
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("o1"));

        let err = OrderRepository::insert(&mut tx, &retry).await.unwrap_err();
        assert!(err.is_unique_violation_on("orders.device_id"));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_null_device_orders_never_collide() {
        let db = memory_db().await;
        let a = order("o1", 126, None, OrderStatus::Completed, 100);
        let mut b = order("o2", 127, None, OrderStatus::Completed, 100);
        b.ordered_at = a.ordered_at;

        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &a).await.unwrap();
        OrderRepository::insert(&mut tx, &b).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_sequence_rejected() {
        let db = memory_db().await;
        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order("o1", 126, Some("A"), OrderStatus::Completed, 100))
            .await
            .unwrap();
        let err = OrderRepository::insert(&mut tx, &order("o2", 126, Some("B"), OrderStatus::Completed, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_stats_sum_completed_only() {
        let db = memory_db().await;
        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order("o1", 126, None, OrderStatus::Completed, 100))
            .await
            .unwrap();
        OrderRepository::insert(&mut tx, &order("o2", 127, None, OrderStatus::Cancelled, 50))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stats = db.orders().stats_for_day(day()).await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.completed_orders, 1);
        assert_eq!(stats.cancelled_orders, 1);
        assert_eq!(stats.total_revenue_cents, 100);

        let empty = db.orders().stats_for_day(day().succ_opt().unwrap()).await.unwrap();
        assert_eq!(empty.total_orders, 0);
        assert_eq!(empty.total_revenue_cents, 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_cancel() {
        let db = memory_db().await;
        let mut tx = db.begin().await.unwrap();
        for (i, device) in ["A", "B", "A"].iter().enumerate() {
            let o = order(&format!("o{i}"), 126 + i as i64, Some(device), OrderStatus::Completed, 100);
            OrderRepository::insert(&mut tx, &o).await.unwrap();
        }
        tx.commit().await.unwrap();

        let all = db.orders().list(&OrderFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].sequence, 128, "newest first");

        let device_a = db
            .orders()
            .list(&OrderFilter {
                device_id: Some("A".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(device_a.len(), 2);

        assert_eq!(db.orders().cancel("o1", Utc::now()).await.unwrap(), 1);
        assert_eq!(db.orders().cancel("o1", Utc::now()).await.unwrap(), 0);

        let cancelled = db
            .orders()
            .list(&OrderFilter {
                status: Some(OrderStatus::Cancelled),
                from: Some(day()),
                to: Some(day()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, "o1");

        let paged = db
            .orders()
            .list(&OrderFilter {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].sequence, 127);
    }
}
