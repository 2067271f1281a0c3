//! # Settlement Aggregator
//!
//! Manual end-of-day settlements computed from a fresh scan of the day's
//! completed orders.
//!
//! The scan runs inside the `INSERT … SELECT` that writes the settlement, so
//! the totals are exactly the orders committed before that statement.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::LedgerResult;
use pearl_core::validation::{validate_device_id, validate_inventory_counts};
use pearl_core::{BusinessCalendar, Clock, Settlement, SettlementSeed};
use pearl_db::repository::settlement::SettlementRepository;
use pearl_db::Database;

#[derive(Clone)]
pub struct SettlementAggregator {
    db: Database,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
}

impl SettlementAggregator {
    pub fn new(db: Database, clock: Arc<dyn Clock>, calendar: BusinessCalendar) -> Self {
        SettlementAggregator {
            db,
            clock,
            calendar,
        }
    }

    /// Submits a settlement for today's business date.
    pub async fn submit(&self, seed: SettlementSeed) -> LedgerResult<Settlement> {
        validate_device_id(seed.device_id.as_deref())?;
        validate_inventory_counts(&seed.inventory_counts)?;

        let now = self.clock.now();
        let day = self.calendar.business_date(now);
        let id = Uuid::new_v4().to_string();

        let mut tx = self.db.begin().await?;
        let mut settlement =
            SettlementRepository::insert_from_orders(&mut tx, &id, day, &seed, now).await?;
        settlement.inventory_counts =
            SettlementRepository::insert_counts(&mut tx, &id, &seed.inventory_counts).await?;
        tx.commit().await?;

        info!(
            settlement_id = %settlement.id,
            business_date = %day,
            orders = settlement.total_orders,
            net_revenue = settlement.net_revenue_cents,
            "Settlement submitted"
        );
        Ok(settlement)
    }

    /// Latest settlement submitted for today, of either source.
    pub async fn get_today_settlement(&self) -> LedgerResult<Option<Settlement>> {
        let today = self.calendar.today(self.clock.as_ref());
        Ok(self.db.settlements().latest_for_day(today).await?)
    }

    pub async fn get_settlement(&self, id: &str) -> LedgerResult<Option<Settlement>> {
        Ok(self.db.settlements().get_by_id(id).await?)
    }
}
