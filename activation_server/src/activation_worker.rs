use std::time::Duration;

use activation_engine::{ActivationApi, SqliteDatabase};
use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

/// Starts the boost activation scheduler. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_activation_worker(api: ActivationApi<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("⏰️ Boost activation worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            let summary = api.schedule_activations(Utc::now()).await;
            match (summary.errors, summary.activated + summary.ended) {
                (0, 0) => trace!("⏰️ No boosts due"),
                (0, _) => info!("⏰️ {} boosts activated, {} ended", summary.activated, summary.ended),
                (errors, _) => warn!(
                    "⏰️ Activation run finished with {errors} errors ({} deferred for budget). {summary:?}",
                    summary.deferred
                ),
            }
        }
    })
}
