//! # Alert Sweep
//!
//! Background task that periodically re-runs the low-stock check over every
//! active material. It catches materials that became low through paths the
//! inline checks do not cover, such as a threshold raised in the catalog.
//!
//! ```text
//! loop {
//!     select! {
//!         interval.tick()  → stock.sweep_alerts()   (errors logged, loop continues)
//!         shutdown_rx      → break
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::stock::StockLedger;

/// Runs the periodic alert check.
pub struct AlertSweep {
    stock: StockLedger,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a spawned [`AlertSweep`].
pub struct AlertSweepHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl AlertSweepHandle {
    /// Stops the sweep and waits for the loop to exit.
    pub async fn shutdown(self) {
        // A closed channel means the loop has already exited
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(?e, "Alert sweep task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl AlertSweep {
    pub fn new(stock: StockLedger, interval: Duration) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sweep = AlertSweep {
            stock,
            interval,
            shutdown_rx,
        };
        (sweep, shutdown_tx)
    }

    /// Runs the sweep loop until shutdown is signalled.
    ///
    /// The first check runs immediately.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Alert sweep starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.stock.sweep_alerts().await {
                        Ok(raised) if raised > 0 => info!(raised, "Alert sweep raised alerts"),
                        Ok(_) => debug!("Alert sweep found nothing new"),
                        Err(e) => error!(?e, "Alert sweep failed"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Alert sweep shutting down");
                    break;
                }
            }
        }

        info!("Alert sweep stopped");
    }
}

/// Spawns the sweep on the current runtime. `None` disables it.
pub fn spawn_alert_sweep(
    stock: StockLedger,
    interval: Option<Duration>,
) -> Option<AlertSweepHandle> {
    let interval = interval.filter(|d| !d.is_zero())?;
    let (sweep, shutdown_tx) = AlertSweep::new(stock, interval);
    let task = tokio::spawn(sweep.run());
    Some(AlertSweepHandle { shutdown_tx, task })
}
