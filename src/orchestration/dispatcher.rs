//! Dispatch worker loop. Each worker repeatedly claims the next queued task
//! and hands it to the execution service; a pause flag stops claiming
//! without touching work already in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::orchestration::core::Orchestrator;

/// How long a paused worker sleeps before re-checking the pause flag
const PAUSE_POLL: Duration = Duration::from_millis(200);

pub(crate) async fn worker_loop(
    orchestrator: Arc<Orchestrator>,
    worker_id: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker_id, "⚙️ Dispatch worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        if orchestrator.is_paused() {
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(PAUSE_POLL) => {}
            }
            continue;
        }

        // Claims run to completion rather than racing the shutdown signal;
        // the dequeue timeout bounds shutdown latency.
        match orchestrator.claim_next().await {
            Ok(Some(claimed)) => orchestrator.dispatch_claimed(claimed).await,
            Ok(None) => {}
            Err(e) => {
                error!(worker_id, error = %e, "Claim failed");
                tokio::time::sleep(PAUSE_POLL).await;
            }
        }
    }
    info!(worker_id, "⚙️ Dispatch worker stopped");
}
