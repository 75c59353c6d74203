use std::time::Duration;

use activation_engine::{ReconciliationApi, SqliteDatabase};
use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::processor::ProcessorGateway;

pub type Sweeper = ReconciliationApi<SqliteDatabase, ProcessorGateway<checkout_processor::ProcessorApi>>;

/// Starts the reconciliation sweep. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Runs never overlap: the next tick is only awaited once the current sweep has returned.
pub fn start_sweep_worker(api: Sweeper, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("🧹️ Reconciliation sweep worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🧹️ Running reconciliation sweep");
            let summary = api.run_sweep(Utc::now()).await;
            if summary.errors > 0 {
                warn!("🧹️ Sweep finished with {} errors. {summary:?}", summary.errors);
            } else if summary.examined > 0 {
                info!(
                    "🧹️ Sweep examined {} transactions. {} reconciled, {} expired, {} still open",
                    summary.examined, summary.reconciled, summary.expired, summary.still_open
                );
            } else if summary.refunded > 0 {
                info!("🧹️ Sweep confirmed {} outstanding refunds", summary.refunded);
            } else {
                trace!("🧹️ Nothing to reconcile");
            }
        }
    })
}
