//! services/api/src/sweeper.rs
//!
//! Background task that periodically drops stale part claims in every group,
//! so abandoned parts come back even when nobody opens the group.

use chrono::Utc;
use reading_groups_core::service::ReadingService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Spawns the sweeper. It runs once per `period` until `token` is cancelled.
pub fn spawn_sweeper(
    reading: ReadingService,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Claim sweeper started, running every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    match reading.sweep_all(Utc::now()).await {
                        Ok(0) => {}
                        Ok(cleaned) => info!("Cleaned up stale claims in {} groups", cleaned),
                        Err(e) => error!("Claim sweep failed: {:?}", e),
                    }
                }
            }
        }
        info!("Claim sweeper stopped.");
    })
}
