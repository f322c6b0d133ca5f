//! Background maintenance loops: the active-dispatch deadline sweep and the
//! retry-scheduler poll. Both are plain intervals; the transition work lives
//! on the orchestrator so the loops stay trivially shutdown-safe.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::orchestration::core::Orchestrator;

pub(crate) async fn sweep_loop(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(interval_ms = interval.as_millis() as u64, "⏳ Timeout sweep started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let swept = orchestrator.sweep_expired().await;
                if swept > 0 {
                    debug!(swept, "⏰ Expired dispatches swept");
                }
            }
        }
    }
    info!("⏳ Timeout sweep stopped");
}

pub(crate) async fn retry_poll_loop(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(interval_ms = interval.as_millis() as u64, "🔁 Retry poller started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                match orchestrator.poll_due_retries().await {
                    Ok(requeued) if requeued > 0 => {
                        debug!(requeued, "🔁 Due retries moved back to the queue");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Retry poll failed"),
                }
            }
        }
    }
    info!("🔁 Retry poller stopped");
}
