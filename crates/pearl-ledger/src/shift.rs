//! # Shift Ledger
//!
//! One open shift per device, running totals, and closing into a settlement.
//!
//! ## Closing a Shift
//! ```text
//! BEGIN
//!   lock(shift)                         ← first write; missing → NotFound
//!   read shift                          ← closed → Conflict
//!   INSERT settlement (shift totals)
//!   INSERT inventory_counts
//!   UPDATE shift SET status = closed, closed_at, settlement_id
//! COMMIT
//! ```
//!
//! Orders committed before the close are in the totals; orders arriving
//! after it find no open shift and are not counted anywhere but the day.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use pearl_core::validation::{validate_device_id, validate_inventory_counts};
use pearl_core::{
    BusinessCalendar, Clock, Order, OrderStatus, Settlement, SettlementSeed, SettlementSource,
    Shift, ShiftStatus,
};
use pearl_db::repository::settlement::SettlementRepository;
use pearl_db::repository::shift::ShiftRepository;
use pearl_db::{Database, DbError};

#[derive(Clone)]
pub struct ShiftLedger {
    db: Database,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
}

impl ShiftLedger {
    pub fn new(db: Database, clock: Arc<dyn Clock>, calendar: BusinessCalendar) -> Self {
        ShiftLedger {
            db,
            clock,
            calendar,
        }
    }

    /// Opens a shift for a device (`None` is a device of its own).
    ///
    /// ## Errors
    /// `Conflict` when that device already has an open shift.
    pub async fn open_shift(&self, device_id: Option<&str>) -> LedgerResult<Shift> {
        validate_device_id(device_id)?;

        let shift = Shift {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.map(str::to_string),
            status: ShiftStatus::Open,
            opened_at: self.clock.now(),
            closed_at: None,
            total_orders: 0,
            total_revenue_cents: 0,
            total_discount_cents: 0,
            net_revenue_cents: 0,
            settlement_id: None,
        };

        match self.db.shifts().insert(&shift).await {
            Ok(()) => {}
            Err(DbError::UniqueViolation { .. }) => {
                return Err(LedgerError::conflict(format!(
                    "device {} already has an open shift",
                    device_id.unwrap_or("<none>")
                )));
            }
            Err(e) => return Err(e.into()),
        }

        info!(shift_id = %shift.id, device_id = ?device_id, "Shift opened");
        Ok(shift)
    }

    pub async fn get_current_open_shift(
        &self,
        device_id: Option<&str>,
    ) -> LedgerResult<Option<Shift>> {
        Ok(self.db.shifts().find_open_for_device(device_id).await?)
    }

    pub async fn get_shift(&self, id: &str) -> LedgerResult<Option<Shift>> {
        Ok(self.db.shifts().get_by_id(id).await?)
    }

    /// Adds a completed order to a shift's totals.
    ///
    /// Returns `false` when nothing was counted: unknown or closed shift, or
    /// an order that is not `Completed`.
    pub async fn accumulate(&self, shift_id: &str, order: &Order) -> LedgerResult<bool> {
        let mut tx = self.db.begin().await?;
        if !ShiftRepository::lock(&mut tx, shift_id).await? {
            debug!(shift_id, "Unknown shift, order not accumulated");
            return Ok(false);
        }
        let counted = Self::accumulate_in(&mut tx, shift_id, order, self.clock.now()).await?;
        tx.commit().await?;
        Ok(counted)
    }

    /// Accumulation step shared with order intake, inside its transaction.
    pub(crate) async fn accumulate_in(
        conn: &mut SqliteConnection,
        shift_id: &str,
        order: &Order,
        now: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        if order.status != OrderStatus::Completed {
            return Ok(false);
        }

        let counted = ShiftRepository::accumulate(
            &mut *conn,
            shift_id,
            order.subtotal_cents,
            order.discount.amount_cents,
            now,
        )
        .await?
            > 0;

        if counted {
            debug!(shift_id, order_id = %order.id, "Order accumulated into shift");
        } else {
            debug!(shift_id, order_id = %order.id, "Shift not open, order not accumulated");
        }
        Ok(counted)
    }

    /// Closes an open shift and snapshots it into a settlement.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown shift
    /// - `Conflict` for a shift that is already closed
    pub async fn close_shift(
        &self,
        shift_id: &str,
        seed: SettlementSeed,
    ) -> LedgerResult<(Shift, Settlement)> {
        validate_inventory_counts(&seed.inventory_counts)?;

        let mut tx = self.db.begin().await?;
        if !ShiftRepository::lock(&mut tx, shift_id).await? {
            return Err(LedgerError::not_found("Shift", shift_id));
        }
        let shift = ShiftRepository::get_by_id_in(&mut tx, shift_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Shift", shift_id))?;
        if !shift.is_open() {
            return Err(LedgerError::conflict(format!(
                "shift {} is already closed",
                shift_id
            )));
        }

        let now = self.clock.now();
        let mut settlement = Settlement {
            id: Uuid::new_v4().to_string(),
            business_date: self.calendar.business_date(now),
            source: SettlementSource::Shift,
            shift_id: Some(shift.id.clone()),
            device_id: shift.device_id.clone(),
            total_orders: shift.total_orders,
            total_revenue_cents: shift.total_revenue_cents,
            total_discount_cents: shift.total_discount_cents,
            net_revenue_cents: shift.net_revenue_cents,
            incentive_target: seed.incentive_target,
            incentive_items_sold: seed.incentive_items_sold,
            incentive_achieved: seed.incentive_achieved(),
            notes: seed.notes.clone(),
            submitted_at: now,
            inventory_counts: Vec::new(),
        };
        SettlementRepository::insert(&mut tx, &settlement).await?;
        settlement.inventory_counts =
            SettlementRepository::insert_counts(&mut tx, &settlement.id, &seed.inventory_counts)
                .await?;

        if ShiftRepository::close(&mut tx, shift_id, now, &settlement.id).await? == 0 {
            return Err(LedgerError::conflict(format!(
                "shift {} is already closed",
                shift_id
            )));
        }
        let closed = ShiftRepository::get_by_id_in(&mut tx, shift_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Shift", shift_id))?;
        tx.commit().await?;

        info!(
            shift_id,
            settlement_id = %settlement.id,
            orders = closed.total_orders,
            net_revenue = closed.net_revenue_cents,
            "Shift closed"
        );
        Ok((closed, settlement))
    }
}
