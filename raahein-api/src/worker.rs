use std::sync::Arc;

use raahein_engine::Market;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

/// Periodically moves stale ACTIVE ride requests to EXPIRED.
///
/// Reads also sweep on their own, so this only keeps the table tidy between
/// requests. A failed pass is logged and retried on the next tick.
pub fn spawn_expiry_sweeper(market: Arc<Market>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Expiry sweeper started, running every {:?}", every);

        loop {
            ticker.tick().await;
            if let Err(e) = market.requests.sweep_expired().await {
                error!("Expiry sweep failed: {}", e);
            }
        }
    })
}
