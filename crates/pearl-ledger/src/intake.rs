//! # Order Intake
//!
//! Validates, prices, numbers and persists orders coming from terminals,
//! including replays from a terminal's offline queue.
//!
//! ## Create Order Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. validate_new_order()          no transaction yet                    │
//! │  2. price_order()                 pure, pearl-core                      │
//! │                                                                         │
//! │  3. BEGIN ─────────────────────────────────────────────────────────┐    │
//! │     │ sequence: allocate (or reserve a pre-assigned one)   ← lock  │    │
//! │     │ retry key (device_id, ordered_at) seen before? → duplicate   │    │
//! │     │ attach the device's open shift                               │    │
//! │     │ INSERT order + lines                                         │    │
//! │     │ accumulate shift totals (completed orders)                   │    │
//! │     COMMIT ────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  4. consume_for_order()           own transaction; failure is logged,   │
//! │                                   the sale stands                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Offline Retries
//! A terminal that lost connectivity resubmits its queue with
//! [`OrderIntake::batch_create`]. Orders already recorded under the same
//! `(device_id, ordered_at)` are skipped, so a replay never double counts
//! revenue or stock. Orders without a device id have no retry key and are
//! never deduplicated. Candidates that fail validation or conflict come
//! back as rejected; the terminal keeps those in its queue.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::sequence::SequenceAllocator;
use crate::shift::ShiftLedger;
use crate::stock::StockLedger;
use pearl_core::pricing::price_order;
use pearl_core::validation::validate_new_order;
use pearl_core::{BusinessCalendar, Clock, NewOrder, Order, OrderFilter, OrderLine, OrderStats};
use pearl_db::repository::order::OrderRepository;
use pearl_db::repository::shift::ShiftRepository;
use pearl_db::{Database, DbError};

/// Result of [`OrderIntake::batch_create`].
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Orders recorded by this call, in submission order.
    pub created: Vec<Order>,
    /// Candidates already recorded under their retry key.
    pub duplicates: usize,
    pub rejected: Vec<RejectedOrder>,
}

impl BatchOutcome {
    /// Every candidate was either created or already recorded.
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// A batch candidate that was not recorded. The terminal should keep it.
#[derive(Debug)]
pub struct RejectedOrder {
    /// Position in the submitted batch.
    pub index: usize,
    pub order: NewOrder,
    /// `Validation` or `Conflict`.
    pub error: LedgerError,
}

/// Outcome of the insert transaction.
enum Inserted {
    Created(Order),
    /// Already recorded under the same retry key (id when known).
    Duplicate(Option<String>),
}

#[derive(Clone)]
pub struct OrderIntake {
    db: Database,
    sequences: SequenceAllocator,
    stock: StockLedger,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
}

impl OrderIntake {
    pub fn new(
        db: Database,
        sequences: SequenceAllocator,
        stock: StockLedger,
        clock: Arc<dyn Clock>,
        calendar: BusinessCalendar,
    ) -> Self {
        OrderIntake {
            db,
            sequences,
            stock,
            clock,
            calendar,
        }
    }

    /// Records one order.
    ///
    /// ## Errors
    /// - `Validation` for malformed input (nothing is written)
    /// - `Conflict` when the retry key or a pre-assigned sequence is taken
    /// - retryable `Database` errors when the write lock is not available
    pub async fn create_order(&self, new: NewOrder) -> LedgerResult<Order> {
        validate_new_order(&new)?;

        match self.insert(&new).await? {
            Inserted::Created(order) => {
                self.consume(&order).await;
                Ok(order)
            }
            Inserted::Duplicate(existing) => Err(LedgerError::conflict(format!(
                "order from device {} at {} already recorded{}",
                new.device_id.as_deref().unwrap_or("<none>"),
                new.ordered_at,
                existing.map(|id| format!(" as {id}")).unwrap_or_default()
            ))),
        }
    }

    /// Records a batch of orders from an offline queue.
    ///
    /// Duplicates are skipped silently and only counted. A candidate that
    /// fails validation or conflicts (for example a pre-assigned sequence
    /// already taken) is returned in [`BatchOutcome::rejected`] so the
    /// terminal keeps it; the rest of the queue still goes through.
    /// Storage errors abort the batch; orders created before the failure
    /// stay committed and are deduplicated on retry.
    pub async fn batch_create(&self, orders: Vec<NewOrder>) -> LedgerResult<BatchOutcome> {
        let submitted = orders.len();
        let mut outcome = BatchOutcome::default();

        for (index, new) in orders.into_iter().enumerate() {
            if let Err(e) = validate_new_order(&new) {
                warn!(
                    index,
                    device_id = ?new.device_id,
                    ordered_at = %new.ordered_at,
                    error = %e,
                    "Rejected invalid order in batch"
                );
                outcome.rejected.push(RejectedOrder {
                    index,
                    order: new,
                    error: e.into(),
                });
                continue;
            }

            match self.insert(&new).await {
                Ok(Inserted::Created(order)) => {
                    self.consume(&order).await;
                    outcome.created.push(order);
                }
                Ok(Inserted::Duplicate(existing)) => {
                    debug!(
                        device_id = ?new.device_id,
                        ordered_at = %new.ordered_at,
                        existing_id = ?existing,
                        "Skipping duplicate order"
                    );
                    outcome.duplicates += 1;
                }
                Err(e @ LedgerError::Conflict(_)) => {
                    warn!(
                        index,
                        device_id = ?new.device_id,
                        ordered_at = %new.ordered_at,
                        error = %e,
                        "Rejected conflicting order in batch"
                    );
                    outcome.rejected.push(RejectedOrder {
                        index,
                        order: new,
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            submitted,
            created = outcome.created.len(),
            duplicates = outcome.duplicates,
            rejected = outcome.rejected.len(),
            "Order batch processed"
        );
        Ok(outcome)
    }

    pub async fn get_order(&self, id: &str) -> LedgerResult<Option<Order>> {
        Ok(self.db.orders().get_by_id(id).await?)
    }

    /// Orders matching `filter`, newest first.
    pub async fn list_orders(&self, filter: OrderFilter) -> LedgerResult<Vec<Order>> {
        Ok(self.db.orders().list(&filter).await?)
    }

    /// Counters for one business day. Revenue counts completed orders only.
    pub async fn get_stats(&self, day: NaiveDate) -> LedgerResult<OrderStats> {
        Ok(self.db.orders().stats_for_day(day).await?)
    }

    /// Counters for today's business date.
    pub async fn get_today_stats(&self) -> LedgerResult<OrderStats> {
        self.get_stats(self.calendar.today(self.clock.as_ref())).await
    }

    /// Marks a completed order cancelled. Stock and shift totals are left
    /// as they are; refunds are handled outside the ledger.
    ///
    /// Returns `None` for an unknown order.
    pub async fn cancel_order(&self, id: &str) -> LedgerResult<Option<Order>> {
        if self.db.orders().cancel(id, self.clock.now()).await? == 0 {
            return match self.db.orders().get_by_id(id).await? {
                Some(_) => Err(LedgerError::conflict(format!(
                    "order {} is already cancelled",
                    id
                ))),
                None => Ok(None),
            };
        }

        info!(order_id = %id, "Order cancelled");
        self.get_order(id).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn insert(&self, new: &NewOrder) -> LedgerResult<Inserted> {
        let priced = price_order(&new.lines, new.discount);
        let business_date = self.calendar.business_date(new.ordered_at);
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;

        let (sequence, order_code) = match new.sequence {
            Some(sequence) => {
                self.sequences
                    .reserve(&mut tx, business_date, sequence, now)
                    .await?;
                let code = new
                    .order_code
                    .clone()
                    .unwrap_or_else(|| self.sequences.format_code(sequence));
                (sequence, code)
            }
            None => {
                let sequence = self
                    .sequences
                    .next_sequence(&mut tx, business_date, now)
                    .await?;
                (sequence, self.sequences.format_code(sequence))
            }
        };

        if let Some(device_id) = new.device_id.as_deref() {
            if let Some(existing) =
                OrderRepository::find_id_by_retry_key(&mut tx, device_id, new.ordered_at).await?
            {
                tx.rollback().await?;
                return Ok(Inserted::Duplicate(Some(existing)));
            }
        }

        let shift_id = match new.device_id.as_deref() {
            Some(device_id) => {
                ShiftRepository::find_open_for_device_in(&mut tx, Some(device_id))
                    .await?
                    .map(|s| s.id)
            }
            None => None,
        };

        let order_id = Uuid::new_v4().to_string();
        let lines = new
            .lines
            .iter()
            .zip(&priced.line_subtotals)
            .enumerate()
            .map(|(position, (line, subtotal))| OrderLine {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name.trim().to_string(),
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
                addons: line.addons.clone(),
                subtotal_cents: subtotal.cents(),
                position: position as i64,
            })
            .collect();

        let order = Order {
            id: order_id,
            sequence,
            order_code,
            ordered_at: new.ordered_at,
            business_date,
            lines,
            subtotal_cents: priced.subtotal.cents(),
            discount: priced.discount,
            total_cents: priced.total.cents(),
            status: new.status,
            payment_method: new.payment_method,
            customer_segment: new.customer_segment.clone(),
            device_id: new.device_id.clone(),
            shift_id,
            created_at: now,
            updated_at: now,
        };

        match OrderRepository::insert(&mut tx, &order).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation_on("orders.device_id") => {
                tx.rollback().await?;
                return Ok(Inserted::Duplicate(None));
            }
            Err(e @ DbError::UniqueViolation { .. }) => {
                return Err(LedgerError::conflict(format!(
                    "sequence {} is already used on {}: {}",
                    order.sequence, business_date, e
                )));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(shift_id) = order.shift_id.as_deref() {
            ShiftLedger::accumulate_in(&mut tx, shift_id, &order, now).await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            sequence = order.sequence,
            order_code = %order.order_code,
            total = order.total_cents,
            shift_id = ?order.shift_id,
            "Order created"
        );
        Ok(Inserted::Created(order))
    }

    /// Stock consumption after the order is committed. Never fails the sale.
    async fn consume(&self, order: &Order) {
        if let Err(e) = self.stock.consume_for_order(order).await {
            error!(
                order_id = %order.id,
                order_code = %order.order_code,
                error = %e,
                "Stock consumption failed; order kept, needs manual reconciliation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, Utc};

    use crate::error::LedgerError;
    use crate::test_support::{ledger, pearls, start_of_test};
    use pearl_core::{
        Clock, Discount, NewOrder, NewOrderLine, OrderFilter, OrderStatus, Quantity,
        StockChangeKind, StockRecordFilter,
    };

    fn milk_tea(qty: i64) -> NewOrderLine {
        NewOrderLine::new("milk-tea", "Milk Tea", 5000, qty)
    }

    fn order_at(offset_secs: i64) -> NewOrder {
        NewOrder::new(
            start_of_test() + Duration::seconds(offset_secs),
            vec![milk_tea(1)],
        )
    }

    #[tokio::test]
    async fn test_sequences_continue_after_initial_value() {
        let (ledger, _) = ledger().await;

        let first = ledger.orders().create_order(order_at(0)).await.unwrap();
        let second = ledger.orders().create_order(order_at(1)).await.unwrap();

        assert_eq!(first.sequence, 126);
        assert_eq!(first.order_code, "#0126");
        assert_eq!(second.sequence, 127);
        assert_eq!(second.order_code, "#0127");
        assert_eq!(
            first.business_date,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_sequence_restarts_each_business_day() {
        let (ledger, _) = ledger().await;

        ledger.orders().create_order(order_at(0)).await.unwrap();
        let tomorrow = ledger
            .orders()
            .create_order(order_at(24 * 60 * 60))
            .await
            .unwrap();

        assert_eq!(tomorrow.sequence, 126);
        assert_eq!(
            tomorrow.business_date,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
    }

    #[tokio::test]
    async fn test_pre_assigned_sequence_is_kept() {
        let (ledger, _) = ledger().await;

        let mut replayed = order_at(0).with_device("pos-1");
        replayed.sequence = Some(200);
        replayed.order_code = Some("T-200".to_string());
        let order = ledger.orders().create_order(replayed).await.unwrap();
        assert_eq!((order.sequence, order.order_code.as_str()), (200, "T-200"));

        // Allocation continues above the reserved number
        let next = ledger.orders().create_order(order_at(1)).await.unwrap();
        assert_eq!(next.sequence, 201);

        let mut clash = order_at(2).with_device("pos-2");
        clash.sequence = Some(200);
        let err = ledger.orders().create_order(clash).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_totals_are_priced_from_lines() {
        let (ledger, _) = ledger().await;

        let new = NewOrder::new(
            start_of_test(),
            vec![
                milk_tea(2).with_addon("Pearls", 1000),
                NewOrderLine::new("black-tea", "Black Tea", 4000, 1),
            ],
        )
        .with_discount(Discount::fixed(500));
        let order = ledger.orders().create_order(new).await.unwrap();

        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].subtotal_cents, 12000);
        assert_eq!(order.lines[1].position, 1);
        assert_eq!(order.subtotal_cents, 16000);
        assert_eq!(order.discount.amount_cents, 500);
        assert_eq!(order.total_cents, 15500);

        let stored = ledger.orders().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn test_invalid_order_writes_nothing() {
        let (ledger, _) = ledger().await;

        let empty = NewOrder::new(start_of_test(), Vec::new());
        let err = ledger.orders().create_order(empty).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        // The failed attempt did not consume a sequence
        let order = ledger.orders().create_order(order_at(0)).await.unwrap();
        assert_eq!(order.sequence, 126);
    }

    #[tokio::test]
    async fn test_retry_with_same_device_and_time_conflicts() {
        let (ledger, _) = ledger().await;

        ledger
            .orders()
            .create_order(order_at(0).with_device("pos-1"))
            .await
            .unwrap();
        let err = ledger
            .orders()
            .create_order(order_at(0).with_device("pos-1"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Same instant on another terminal is a different sale
        let other = ledger
            .orders()
            .create_order(order_at(0).with_device("pos-2"))
            .await
            .unwrap();
        assert_eq!(other.sequence, 127);
    }

    #[tokio::test]
    async fn test_orders_without_device_are_never_deduplicated() {
        let (ledger, _) = ledger().await;

        let outcome = ledger
            .orders()
            .batch_create(vec![order_at(0), order_at(0)])
            .await
            .unwrap();
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.duplicates, 0);
    }

    #[tokio::test]
    async fn test_batch_replay_is_idempotent() {
        let (ledger, _) = ledger().await;
        let queue: Vec<NewOrder> = (0..3).map(|i| order_at(i).with_device("pos-1")).collect();

        let first = ledger.orders().batch_create(queue.clone()).await.unwrap();
        assert_eq!(first.created.len(), 3);

        let replay = ledger.orders().batch_create(queue).await.unwrap();
        assert!(replay.created.is_empty());
        assert_eq!(replay.duplicates, 3);
        assert!(replay.is_complete());

        let all = ledger
            .orders()
            .list_orders(OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_batch_same_instant_on_two_devices() {
        let (ledger, _) = ledger().await;

        let outcome = ledger
            .orders()
            .batch_create(vec![
                order_at(0).with_device("pos-1"),
                order_at(0).with_device("pos-2"),
                order_at(0).with_device("pos-1"),
            ])
            .await
            .unwrap();

        let devices: Vec<Option<&str>> = outcome
            .created
            .iter()
            .map(|o| o.device_id.as_deref())
            .collect();
        assert_eq!(devices, vec![Some("pos-1"), Some("pos-2")]);
        assert_eq!(outcome.duplicates, 1);
    }

    #[tokio::test]
    async fn test_batch_returns_invalid_candidates() {
        let (ledger, _) = ledger().await;

        let mut too_many = order_at(1).with_device("pos-1");
        too_many.lines = vec![milk_tea(5000)];
        let queue = vec![
            order_at(0).with_device("pos-1"),
            too_many,
            NewOrder::new(start_of_test(), Vec::new()).with_device("pos-1"),
            order_at(3).with_device("pos-1"),
        ];
        let outcome = ledger.orders().batch_create(queue).await.unwrap();

        let sequences: Vec<i64> = outcome.created.iter().map(|o| o.sequence).collect();
        assert_eq!(sequences, vec![126, 127]);
        assert!(!outcome.is_complete());

        let rejected: Vec<usize> = outcome.rejected.iter().map(|r| r.index).collect();
        assert_eq!(rejected, vec![1, 2]);
        assert!(outcome
            .rejected
            .iter()
            .all(|r| matches!(r.error, LedgerError::Validation(_))));
        assert_eq!(outcome.rejected[0].order.lines[0].quantity, 5000);
    }

    #[tokio::test]
    async fn test_batch_returns_taken_sequence_as_conflict() {
        let (ledger, _) = ledger().await;

        // Online sale takes #0126
        ledger
            .orders()
            .create_order(order_at(0).with_device("pos-1"))
            .await
            .unwrap();

        // Another terminal numbered its offline sale 126 as well
        let mut offline = order_at(5).with_device("pos-2");
        offline.sequence = Some(126);
        let outcome = ledger.orders().batch_create(vec![offline]).await.unwrap();

        assert!(outcome.created.is_empty());
        assert_eq!(outcome.duplicates, 0);
        assert_eq!(outcome.rejected.len(), 1);
        assert!(outcome.rejected[0].error.is_conflict());
        assert_eq!(outcome.rejected[0].order.device_id.as_deref(), Some("pos-2"));

        let stats = ledger.orders().get_today_stats().await.unwrap();
        assert_eq!(stats.total_orders, 1);
    }

    #[tokio::test]
    async fn test_order_consumes_recipe_materials() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(1000, 200)).await.unwrap();
        ledger
            .recipes()
            .set_recipe("milk-tea", &material.id, Quantity::from_units(30))
            .await
            .unwrap();

        let new = NewOrder::new(start_of_test(), vec![milk_tea(2)]);
        let order = ledger.orders().create_order(new).await.unwrap();

        let material = ledger.stock().get_material(&material.id).await.unwrap().unwrap();
        assert_eq!(material.current_stock, Quantity::from_units(940));

        let records = ledger
            .stock()
            .list_stock_records(StockRecordFilter {
                order_id: Some(order.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, StockChangeKind::Out);
        assert_eq!(records[0].quantity, Quantity::from_units(-60));
        assert_eq!(records[0].stock_after, Quantity::from_units(940));
    }

    #[tokio::test]
    async fn test_order_without_recipe_leaves_stock_alone() {
        let (ledger, _) = ledger().await;
        let material = ledger.stock().create_material(pearls(1000, 200)).await.unwrap();

        ledger.orders().create_order(order_at(0)).await.unwrap();

        let material = ledger.stock().get_material(&material.id).await.unwrap().unwrap();
        assert_eq!(material.current_stock, Quantity::from_units(1000));
    }

    #[tokio::test]
    async fn test_order_joins_device_shift() {
        let (ledger, _) = ledger().await;
        let shift = ledger.shifts().open_shift(Some("pos-1")).await.unwrap();

        let order = ledger
            .orders()
            .create_order(order_at(0).with_device("pos-1").with_discount(Discount::fixed(100)))
            .await
            .unwrap();
        assert_eq!(order.shift_id.as_deref(), Some(shift.id.as_str()));

        let other = ledger
            .orders()
            .create_order(order_at(0).with_device("pos-2"))
            .await
            .unwrap();
        assert_eq!(other.shift_id, None);

        let shift = ledger.shifts().get_shift(&shift.id).await.unwrap().unwrap();
        assert_eq!(shift.total_orders, 1);
        assert_eq!(shift.total_revenue_cents, 5000);
        assert_eq!(shift.total_discount_cents, 100);
        assert_eq!(shift.net_revenue_cents, 4900);
    }

    #[tokio::test]
    async fn test_bookkeeping_timestamps_follow_clock() {
        let (ledger, clock) = ledger().await;
        let shift = ledger.shifts().open_shift(Some("pos-1")).await.unwrap();
        clock.advance(Duration::minutes(30));

        let order = ledger
            .orders()
            .create_order(order_at(0).with_device("pos-1"))
            .await
            .unwrap();
        let pool = ledger.database().pool();

        let counter: DateTime<Utc> =
            sqlx::query_scalar("SELECT updated_at FROM daily_sequences")
                .fetch_one(pool)
                .await
                .unwrap();
        let shift_touched: DateTime<Utc> =
            sqlx::query_scalar("SELECT updated_at FROM shifts WHERE id = ?")
                .bind(&shift.id)
                .fetch_one(pool)
                .await
                .unwrap();
        assert_eq!(counter, clock.now());
        assert_eq!(shift_touched, clock.now());

        clock.advance(Duration::minutes(5));
        ledger.orders().cancel_order(&order.id).await.unwrap();
        let cancelled: DateTime<Utc> =
            sqlx::query_scalar("SELECT updated_at FROM orders WHERE id = ?")
                .bind(&order.id)
                .fetch_one(pool)
                .await
                .unwrap();
        assert_eq!(cancelled, clock.now());
    }

    #[tokio::test]
    async fn test_stats_and_cancel() {
        let (ledger, clock) = ledger().await;

        let priced = |offset: i64, cents: i64| {
            NewOrder::new(
                start_of_test() + Duration::seconds(offset),
                vec![NewOrderLine::new("milk-tea", "Milk Tea", cents, 1)],
            )
        };
        ledger.orders().create_order(priced(0, 100)).await.unwrap();
        let second = ledger.orders().create_order(priced(1, 50)).await.unwrap();

        let cancelled = ledger
            .orders()
            .cancel_order(&second.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let err = ledger.orders().cancel_order(&second.id).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(ledger.orders().cancel_order("missing").await.unwrap().is_none());

        let stats = ledger.orders().get_today_stats().await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.completed_orders, 1);
        assert_eq!(stats.cancelled_orders, 1);
        assert_eq!(stats.total_revenue_cents, 100);

        let tomorrow = ledger
            .orders()
            .get_stats(clock.now().date_naive() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(tomorrow.total_orders, 0);
    }
}
