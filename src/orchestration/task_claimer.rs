//! # Task Claimer
//!
//! Atomic claim of the next queued task: a single lane pop, then the
//! `ActiveDispatch` record and the status move to `Dispatching` under the
//! task's transition guard, before the worker proceeds to the network call.
//! A crash between pop and dispatch leaves the task either still queued
//! (re-polled) or already active (later timed out) - never lost, and never
//! claimed by two workers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::Result;
use crate::events::{EventPublisher, LifecycleEvent, LifecycleEventKind};
use crate::metrics::MetricsCollector;
use crate::models::{ActiveDispatch, QueuedEntry, Task};
use crate::orchestration::core::TransitionGuards;
use crate::queue::{ActiveRegistry, PriorityQueueStore};
use crate::state_machine::{next_state, TaskEvent, TaskState};
use crate::store::TaskRecordStore;

/// A task claimed by a dispatch worker, with its in-flight metadata
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub task: Task,
    pub dispatch: ActiveDispatch,
}

/// A popped entry that has not reached its next owner yet. If the claim
/// future is dropped mid-flight (shutdown, caller timeout) the entry goes
/// back to its lane instead of being lost.
struct PendingClaim {
    queue: Arc<PriorityQueueStore>,
    entry: Option<QueuedEntry>,
}

impl PendingClaim {
    fn new(queue: Arc<PriorityQueueStore>, entry: QueuedEntry) -> Self {
        Self {
            queue,
            entry: Some(entry),
        }
    }

    /// The entry reached its next owner (or is deliberately discarded);
    /// dropping this guard no longer re-enqueues it.
    fn settle(&mut self) {
        self.entry.take();
    }
}

impl Drop for PendingClaim {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.queue.enqueue(entry);
        }
    }
}

/// Claims queued tasks for dispatch workers
pub struct TaskClaimer {
    queue: Arc<PriorityQueueStore>,
    registry: Arc<ActiveRegistry>,
    store: Arc<dyn TaskRecordStore>,
    publisher: Arc<EventPublisher>,
    metrics: Arc<MetricsCollector>,
    guards: Arc<TransitionGuards>,
}

impl TaskClaimer {
    pub fn new(
        queue: Arc<PriorityQueueStore>,
        registry: Arc<ActiveRegistry>,
        store: Arc<dyn TaskRecordStore>,
        publisher: Arc<EventPublisher>,
        metrics: Arc<MetricsCollector>,
        guards: Arc<TransitionGuards>,
    ) -> Self {
        Self {
            queue,
            registry,
            store,
            publisher,
            metrics,
            guards,
        }
    }

    /// Claim the next dispatchable task, waiting up to `timeout` on an empty
    /// queue. Returns `None` when nothing became claimable in time.
    ///
    /// Entries whose task was cancelled between enqueue and claim are
    /// dropped and the loop moves on to the next entry.
    pub async fn claim_next(&self, timeout: Duration) -> Result<Option<ClaimedTask>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let Some(entry) = self.queue.dequeue(remaining).await else {
                return Ok(None);
            };
            let task_id = entry.task_id;
            // The pop-to-registry move spans awaits; if this future is
            // dropped in between, the pending claim re-enqueues the entry.
            let mut pending = PendingClaim::new(Arc::clone(&self.queue), entry);

            // Status check and the ActiveDispatch insert happen under the
            // per-task guard so a concurrent cancel cannot interleave.
            let _guard = self.guards.lock(task_id).await;
            let mut task = match self.store.load(task_id).await {
                Ok(task) => task,
                Err(e) => {
                    pending.settle();
                    warn!(task_id = %task_id, error = %e, "Dropping queue entry without record");
                    continue;
                }
            };
            if task.status != TaskState::Queued {
                pending.settle();
                debug!(
                    task_id = %task.id,
                    status = %task.status,
                    "Skipping claim: task left the queued state"
                );
                continue;
            }

            task.status = next_state(task.id, task.status, &TaskEvent::Dispatch)?;
            task.last_transition_at = Utc::now();

            let dispatch = ActiveDispatch::new(task.id, task.timeout_seconds);
            self.registry.insert(dispatch.clone());
            // The registry owns the task from here; the timeout sweep covers
            // any interruption past this point.
            pending.settle();
            self.store.save(&task).await?;
            self.store
                .append_history(task.id, format!("dispatching id={}", dispatch.dispatch_id))
                .await?;

            self.publisher.publish_lifecycle(LifecycleEvent::new(
                task.id,
                LifecycleEventKind::Dispatching,
                json!({ "dispatch_id": dispatch.dispatch_id, "deadline": dispatch.deadline }),
            ));
            self.metrics.record_dispatched();
            debug!(
                task_id = %task.id,
                dispatch_id = %dispatch.dispatch_id,
                priority = %task.priority,
                "📤 Task claimed for dispatch"
            );

            return Ok(Some(ClaimedTask { task, dispatch }));
        }
    }
}
