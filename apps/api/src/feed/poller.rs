use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::feed::ingest::FeedIngestor;

/// Runs an ingest immediately, then every `every`, until `shutdown` turns true.
/// A slow run delays the next tick instead of bunching runs together. Shutdown
/// abandons a run in progress.
pub fn spawn_poller(
    ingestor: Arc<FeedIngestor>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Feed poller started (every {}s)", every.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
            tokio::select! {
                _ = ingestor.run_once() => {}
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Feed ingest abandoned for shutdown");
                    break;
                }
            }
        }
        info!("Feed poller stopped");
    })
}

/// Resolves once the flag is true or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
