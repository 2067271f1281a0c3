//! # pearl-ledger: Order Intake and Inventory Ledger
//!
//! The service layer of the Pearl POS ledger. Each service owns its
//! transaction boundaries; repositories in `pearl-db` only run statements.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Ledger                                     │
//! │                                                                         │
//! │   terminals ──► OrderIntake ──────────┬──────────────► ShiftLedger      │
//! │                   │  SequenceAllocator │ accumulate      │ close_shift  │
//! │                   │                    │                 ▼              │
//! │                   └──► StockLedger ◄───┘        SettlementAggregator    │
//! │                          │   ▲                                          │
//! │                          │   └── RecipeIndex                            │
//! │                          └──► AlertSweep (background)                   │
//! │                                                                         │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │                pearl-db (SQLite)      pearl-core (pure rules)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! Every transaction starts with a write (the sequence counter, a material
//! row or a shift row), so SQLite takes its write lock up front and
//! concurrent writers queue on `busy_timeout` instead of failing mid-way.
//!
//! ## Usage
//! ```rust,ignore
//! use pearl_ledger::{Ledger, LedgerConfig};
//!
//! pearl_ledger::init_tracing();
//! let ledger = Ledger::open(LedgerConfig::load(None)?).await?;
//! let _sweep = ledger.spawn_alert_sweep();
//!
//! let order = ledger.orders().create_order(new_order).await?;
//! println!("{} rang up {}", order.order_code, order.total_cents);
//! ```

pub mod config;
pub mod error;
pub mod intake;
pub mod recipe;
pub mod sequence;
pub mod settlement;
pub mod shift;
pub mod stock;
pub mod sweep;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use intake::{BatchOutcome, OrderIntake, RejectedOrder};
pub use recipe::RecipeIndex;
pub use sequence::SequenceAllocator;
pub use settlement::SettlementAggregator;
pub use shift::ShiftLedger;
pub use stock::{MovementNote, StockLedger};
pub use sweep::{spawn_alert_sweep, AlertSweep, AlertSweepHandle};

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use pearl_core::{Clock, SystemClock};
use pearl_db::Database;

/// All ledger services over one database.
#[derive(Clone)]
pub struct Ledger {
    db: Database,
    config: LedgerConfig,
    orders: OrderIntake,
    stock: StockLedger,
    shifts: ShiftLedger,
    settlements: SettlementAggregator,
    recipes: RecipeIndex,
}

impl Ledger {
    /// Opens the database named by `config` and wires up the services.
    pub async fn open(config: LedgerConfig) -> LedgerResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    /// Like [`Ledger::open`] with an injected clock.
    pub async fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        config.validate()?;

        let db_config = config.db_config();
        if !db_config.is_in_memory() {
            if let Some(parent) = db_config.database_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let db = Database::new(db_config).await?;
        info!(
            store = %config.store.name,
            path = %config.database_path().display(),
            "Ledger opened"
        );
        Self::from_database(db, config, clock)
    }

    /// Wires the services over an existing database handle.
    pub fn from_database(
        db: Database,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> LedgerResult<Self> {
        let calendar = config.calendar()?;

        let sequences = SequenceAllocator::new(
            db.clone(),
            config.orders.initial_sequence,
            config.code_format(),
        );
        let stock = StockLedger::new(db.clone(), clock.clone());
        let orders = OrderIntake::new(
            db.clone(),
            sequences,
            stock.clone(),
            clock.clone(),
            calendar,
        );
        let shifts = ShiftLedger::new(db.clone(), clock.clone(), calendar);
        let settlements = SettlementAggregator::new(db.clone(), clock, calendar);
        let recipes = RecipeIndex::new(db.clone());

        Ok(Ledger {
            db,
            config,
            orders,
            stock,
            shifts,
            settlements,
            recipes,
        })
    }

    pub fn orders(&self) -> &OrderIntake {
        &self.orders
    }

    pub fn stock(&self) -> &StockLedger {
        &self.stock
    }

    pub fn shifts(&self) -> &ShiftLedger {
        &self.shifts
    }

    pub fn settlements(&self) -> &SettlementAggregator {
        &self.settlements
    }

    pub fn recipes(&self) -> &RecipeIndex {
        &self.recipes
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Starts the background alert sweep if an interval is configured.
    pub fn spawn_alert_sweep(&self) -> Option<AlertSweepHandle> {
        spawn_alert_sweep(self.stock.clone(), self.config.sweep_interval())
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise ledger events are logged at debug
/// and everything else at info. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pearl=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}


#[cfg(test)]
mod tests {
    use super::*;
    use pearl_core::{FixedClock, NewOrder, NewOrderLine};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("pearl.db");

        let mut config = LedgerConfig::default();
        config.database.path = Some(path.clone());
        config.alerts.sweep_interval_secs = 0;

        let ledger = Ledger::open(config).await.unwrap();
        assert!(path.exists());
        assert!(ledger.spawn_alert_sweep().is_none());
        ledger.close().await;
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let mut config = LedgerConfig::in_memory();
        config.store.utc_offset_minutes = 24 * 60;
        let clock = Arc::new(FixedClock::new(test_support::start_of_test()));
        assert!(matches!(
            Ledger::with_clock(config, clock).await,
            Err(LedgerError::Config(_) | LedgerError::Validation(_))
        ));
    }

    /// Two terminals on a shared file database.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_get_distinct_sequences() {
        let dir = tempdir().unwrap();
        let mut config = LedgerConfig::default();
        config.database.path = Some(dir.path().join("pearl.db"));
        config.database.max_connections = 4;
        config.alerts.sweep_interval_secs = 0;
        let clock = Arc::new(FixedClock::new(test_support::start_of_test()));
        let ledger = Ledger::with_clock(config, clock.clone()).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            let ordered_at = clock.now() + chrono::Duration::seconds(i);
            tasks.push(tokio::spawn(async move {
                let new = NewOrder::new(
                    ordered_at,
                    vec![NewOrderLine::new("milk-tea", "Milk Tea", 5000, 1)],
                )
                .with_device(format!("pos-{}", i % 2));
                ledger.orders().create_order(new).await
            }));
        }

        let mut sequences = Vec::new();
        for task in tasks {
            sequences.push(task.await.unwrap().unwrap().sequence);
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (126..134).collect::<Vec<_>>());
        ledger.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_open_shift_has_one_winner() {
        let dir = tempdir().unwrap();
        let mut config = LedgerConfig::default();
        config.database.path = Some(dir.path().join("pearl.db"));
        config.database.max_connections = 4;
        config.alerts.sweep_interval_secs = 0;
        let clock = Arc::new(FixedClock::new(test_support::start_of_test()));
        let ledger = Ledger::with_clock(config, clock).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let ledger = ledger.clone();
            tasks.push(tokio::spawn(async move {
                ledger.shifts().open_shift(Some("pos-1")).await
            }));
        }

        let mut opened = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => opened += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((opened, conflicts), (1, 3));
        ledger.close().await;
    }
}
