//! # Execution Orchestrator
//!
//! The control loop tying the structures together: accepts submissions,
//! hands claimed tasks to the execution service through the circuit breaker,
//! applies callback and timeout outcomes through the task state machine, and
//! routes failures to the retry scheduler or the dead-letter store.
//!
//! ## Concurrency
//!
//! The priority lanes and the active registry are the only shared mutable
//! state on the dispatch path. Callback processing, the timeout sweep, and
//! cancellation all serialize on a per-task transition guard, and
//! `ActiveRegistry::remove` is the single linearization point: whichever
//! resolver removes the in-flight entry first wins, the rest no-op. That is
//! what makes duplicate and late callbacks idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DispatchqConfig;
use crate::error::{DispatchError, Result};
use crate::events::{EventPublisher, LifecycleEvent, LifecycleEventKind};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::models::{DeadLetterRecord, QueuedEntry, StatusSnapshot, Task};
use crate::orchestration::backoff_calculator::BackoffCalculator;
use crate::orchestration::dispatcher;
use crate::orchestration::error_classifier::{classify, ErrorDisposition};
use crate::orchestration::task_claimer::{ClaimedTask, TaskClaimer};
use crate::orchestration::timeout_sweeper;
use crate::orchestration::types::{
    CallbackAck, CallbackEventKind, CallbackPayload, ExecutionClient, ExecutionFailure,
    FailureKind, SubmitRequest,
};
use crate::queue::{ActiveRegistry, DeadLetterStore, PriorityQueueStore, RetryScheduler};
use crate::resilience::{CircuitBreaker, CircuitBreakerError, CircuitState};
use crate::state_machine::{next_state, TaskEvent, TaskState};
use crate::store::{InMemoryTaskRecordStore, TaskRecordStore};

/// Per-task transition locks. Callback, sweep, claim, and cancel for the
/// same task all serialize here.
#[derive(Debug, Default)]
pub struct TransitionGuards {
    locks: DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
}

impl TransitionGuards {
    pub async fn lock(&self, task_id: Uuid) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(task_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry once the task reached a terminal state. Late
    /// resolvers still no-op on the empty registry, so losing the guard
    /// entry after terminality is safe.
    fn release(&self, task_id: Uuid) {
        self.locks.remove(&task_id);
    }
}

/// The orchestrator: producer API, operator API, and transition logic
pub struct Orchestrator {
    config: DispatchqConfig,
    queue: Arc<PriorityQueueStore>,
    retry_scheduler: Arc<RetryScheduler>,
    dead_letter: Arc<DeadLetterStore>,
    registry: Arc<ActiveRegistry>,
    store: Arc<dyn TaskRecordStore>,
    client: Arc<dyn ExecutionClient>,
    breaker: Arc<CircuitBreaker>,
    publisher: Arc<EventPublisher>,
    metrics: Arc<MetricsCollector>,
    guards: Arc<TransitionGuards>,
    claimer: TaskClaimer,
    paused: AtomicBool,
}

impl Orchestrator {
    /// Build an orchestrator with an in-memory record store
    pub fn new(config: DispatchqConfig, client: Arc<dyn ExecutionClient>) -> Arc<Self> {
        Self::with_components(
            config,
            client,
            Arc::new(InMemoryTaskRecordStore::new()),
            Arc::new(MetricsCollector::new()),
        )
    }

    /// Build an orchestrator with injected store and metrics
    pub fn with_components(
        config: DispatchqConfig,
        client: Arc<dyn ExecutionClient>,
        store: Arc<dyn TaskRecordStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Arc<Self> {
        let queue = Arc::new(PriorityQueueStore::new());
        let registry = Arc::new(ActiveRegistry::new());
        let publisher = Arc::new(EventPublisher::new(config.events.channel_capacity));
        let guards = Arc::new(TransitionGuards::default());
        let retry_scheduler = Arc::new(RetryScheduler::new(BackoffCalculator::new(
            config.backoff.clone(),
        )));
        let breaker = Arc::new(CircuitBreaker::new(
            "execution_service",
            config.circuit_breaker.clone(),
        ));
        let claimer = TaskClaimer::new(
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&publisher),
            Arc::clone(&metrics),
            Arc::clone(&guards),
        );

        Arc::new(Self {
            config,
            queue,
            retry_scheduler,
            dead_letter: Arc::new(DeadLetterStore::new()),
            registry,
            store,
            client,
            breaker,
            publisher,
            metrics,
            guards,
            claimer,
            paused: AtomicBool::new(false),
        })
    }

    // ── Producer API ────────────────────────────────────────────────

    /// Accept a work item into its priority lane
    pub async fn submit(&self, request: SubmitRequest) -> Result<Uuid> {
        let task = Task::new(
            request.priority,
            request.payload,
            request
                .max_retries
                .unwrap_or(self.config.dispatch.default_max_retries),
            request
                .timeout_seconds
                .unwrap_or(self.config.dispatch.default_timeout_seconds),
        );
        self.store.save(&task).await?;
        self.store
            .append_history(task.id, format!("queued priority={}", task.priority))
            .await?;
        self.queue.enqueue(QueuedEntry::new(task.id, task.priority));

        self.publisher.publish_lifecycle(LifecycleEvent::new(
            task.id,
            LifecycleEventKind::Queued,
            json!({ "priority": task.priority }),
        ));
        self.metrics.record_submitted();
        info!(task_id = %task.id, priority = %task.priority, "📥 Task submitted");
        Ok(task.id)
    }

    /// Last known state of a task, including result and error text
    pub async fn get_status(&self, task_id: Uuid) -> Result<StatusSnapshot> {
        Ok(self.store.load(task_id).await?.snapshot())
    }

    /// Cooperative cancellation: removes the task from whichever structure
    /// holds it; an in-flight dispatch gets a best-effort downstream cancel
    /// signal that is never awaited.
    pub async fn cancel(&self, task_id: Uuid) -> Result<()> {
        let _guard = self.guards.lock(task_id).await;
        let mut task = self.store.load(task_id).await?;
        let to = next_state(task_id, task.status, &TaskEvent::Cancel)?;

        self.queue.remove(task_id);
        self.retry_scheduler.remove(task_id);
        if let Some(dispatch) = self.registry.remove(task_id) {
            let client = Arc::clone(&self.client);
            tokio::spawn(async move {
                client.cancel(&dispatch).await;
            });
        }

        task.status = to;
        task.last_transition_at = Utc::now();
        self.store.save(&task).await?;
        self.store
            .append_history(task_id, "cancelled".to_string())
            .await?;
        self.publisher.publish_lifecycle(LifecycleEvent::new(
            task_id,
            LifecycleEventKind::Cancelled,
            json!({}),
        ));
        self.metrics.record_cancelled();
        self.guards.release(task_id);
        info!(task_id = %task_id, "🚫 Task cancelled");
        Ok(())
    }

    // ── Operator API ────────────────────────────────────────────────

    /// Recent dead-letter records, newest first
    pub fn list_dead_letters(&self, limit: usize) -> Vec<DeadLetterRecord> {
        self.dead_letter.list(limit)
    }

    /// Pull a task out of quarantine: reset its retry budget and put it
    /// back in its lane. The only path out of dead-letter, operator-only.
    pub async fn requeue(&self, task_id: Uuid) -> Result<()> {
        let record = self
            .dead_letter
            .take(task_id)
            .ok_or(DispatchError::NotDeadLettered(task_id))?;

        let _guard = self.guards.lock(task_id).await;
        let mut task = match self.store.load(task_id).await {
            Ok(task) => task,
            // Record store lost the row; rebuild enough to run again
            Err(DispatchError::TaskNotFound(_)) => {
                let mut task = Task::new(record.priority, record.payload.clone(), 3, 300);
                task.id = task_id;
                task.status = TaskState::DeadLettered;
                task.error_history = record.error_history.clone();
                task
            }
            Err(e) => return Err(e),
        };

        task.status = next_state(task_id, task.status, &TaskEvent::Requeue)?;
        task.retry_count = 0;
        task.last_error = None;
        task.last_transition_at = Utc::now();

        // Persist before the lane insert; a failed save puts the record
        // back in quarantine instead of leaving a half-requeued task.
        if let Err(e) = self.store.save(&task).await {
            self.dead_letter.quarantine(record);
            return Err(e);
        }
        if let Err(e) = self
            .store
            .append_history(task_id, "requeued from dead-letter".to_string())
            .await
        {
            warn!(task_id = %task_id, error = %e, "History append failed during requeue");
        }
        self.queue.enqueue(QueuedEntry::new(task.id, task.priority));
        self.publisher.publish_lifecycle(LifecycleEvent::new(
            task_id,
            LifecycleEventKind::Requeued,
            json!({ "previous_failures": record.error_history.len() }),
        ));
        self.metrics.record_requeued();
        info!(task_id = %task_id, "♻️ Task requeued from dead-letter");
        Ok(())
    }

    /// Stop claiming new dispatches without dropping queued work
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        info!("⏸️ Dispatching paused");
    }

    /// Resume claiming after a pause
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        info!("▶️ Dispatching resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    // ── Event stream & introspection ────────────────────────────────

    /// Subscribe to a lifecycle event channel (`system` or `task:{id}`)
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<LifecycleEvent> {
        self.publisher.subscribe(channel)
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Entries waiting across all priority lanes
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Dispatches currently with the execution service
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Shared secret for callback signature verification
    pub(crate) fn callback_secret(&self) -> &str {
        &self.config.webhook.shared_secret
    }

    pub(crate) fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    // ── Dispatch path (driven by the worker pool) ───────────────────

    /// Claim the next queued task, parking up to the configured dequeue
    /// timeout on an empty queue
    pub async fn claim_next(&self) -> Result<Option<ClaimedTask>> {
        self.claimer
            .claim_next(Duration::from_millis(self.config.dispatch.dequeue_timeout_ms))
            .await
    }

    /// Hand a claimed task to the execution service through the breaker
    /// and apply the immediate outcome
    pub async fn dispatch_claimed(&self, claimed: ClaimedTask) {
        let task = claimed.task;
        let outcome = self.breaker.call(|| self.client.dispatch(&task)).await;

        match outcome {
            Ok(accepted) => {
                // Stay in Dispatching until the callback arrives
                self.registry
                    .set_correlation(task.id, accepted.correlation_id.clone());
                debug!(
                    task_id = %task.id,
                    correlation_id = %accepted.correlation_id,
                    "🚚 Dispatch accepted by execution service"
                );
            }
            Err(CircuitBreakerError::CircuitOpen { component }) => {
                // The call never reached the network: transient by decree,
                // and no failure is recorded against the breaker itself
                self.metrics.record_circuit_rejection();
                warn!(task_id = %task.id, component = %component, "Dispatch shed by open circuit");
                let failure = ExecutionFailure::new(
                    FailureKind::Network,
                    "circuit open: dispatch shed before reaching the execution service",
                );
                if let Err(e) = self
                    .apply_failure(task.id, failure, Some(ErrorDisposition::Retryable))
                    .await
                {
                    error!(task_id = %task.id, error = %e, "Failed to apply circuit-open outcome");
                }
            }
            Err(CircuitBreakerError::OperationFailed(failure)) => {
                if let Err(e) = self.apply_failure(task.id, failure, None).await {
                    error!(task_id = %task.id, error = %e, "Failed to apply dispatch failure");
                }
            }
        }
    }

    // ── Callback intake ─────────────────────────────────────────────

    /// Apply a verified callback from the execution service.
    ///
    /// Unknown correlation ids (duplicate or late callbacks) are
    /// acknowledged and discarded without any state change.
    pub async fn handle_callback(&self, payload: CallbackPayload) -> Result<CallbackAck> {
        let Some(task_id) = self.registry.resolve_correlation(&payload.correlation_id) else {
            self.metrics.record_callback_discarded();
            debug!(
                correlation_id = %payload.correlation_id,
                event = ?payload.event,
                "Discarding callback without matching active dispatch"
            );
            return Ok(CallbackAck::Discarded);
        };

        match payload.event {
            CallbackEventKind::Started => {
                debug!(task_id = %task_id, "Execution started downstream");
                Ok(CallbackAck::Applied)
            }
            CallbackEventKind::Completed => self.apply_completion(task_id, payload.result).await,
            CallbackEventKind::Failed => {
                let failure = payload.error.unwrap_or_else(|| {
                    ExecutionFailure::new(
                        FailureKind::Unknown("unspecified".to_string()),
                        "failure callback without error body",
                    )
                });
                self.apply_failure(task_id, failure, None).await
            }
            CallbackEventKind::Timeout => {
                let failure = ExecutionFailure::new(
                    FailureKind::Timeout,
                    "execution service reported a timeout",
                );
                self.apply_failure(task_id, failure, None).await
            }
            CallbackEventKind::Cancelled => {
                let failure = ExecutionFailure::new(
                    FailureKind::Cancelled,
                    "execution cancelled by the service",
                );
                self.apply_failure(task_id, failure, None).await
            }
        }
    }

    // ── Transition application ──────────────────────────────────────

    async fn apply_completion(
        &self,
        task_id: Uuid,
        result: Option<serde_json::Value>,
    ) -> Result<CallbackAck> {
        let _guard = self.guards.lock(task_id).await;
        if self.registry.remove(task_id).is_none() {
            self.metrics.record_callback_discarded();
            return Ok(CallbackAck::Discarded);
        }

        let mut task = self.store.load(task_id).await?;
        task.status = next_state(task_id, task.status, &TaskEvent::Complete(result.clone()))?;
        task.result = result;
        task.last_transition_at = Utc::now();
        self.store.save(&task).await?;
        self.store
            .append_history(task_id, "completed".to_string())
            .await?;

        self.publisher.publish_lifecycle(LifecycleEvent::new(
            task_id,
            LifecycleEventKind::Completed,
            json!({ "has_result": task.result.is_some() }),
        ));
        self.metrics.record_completed();
        self.guards.release(task_id);
        info!(task_id = %task_id, "✅ Task completed");
        Ok(CallbackAck::Applied)
    }

    /// Resolve a failed dispatch. `forced_disposition` bypasses
    /// classification for synthetic failures like circuit-open shedding.
    async fn apply_failure(
        &self,
        task_id: Uuid,
        failure: ExecutionFailure,
        forced_disposition: Option<ErrorDisposition>,
    ) -> Result<CallbackAck> {
        let _guard = self.guards.lock(task_id).await;
        if self.registry.remove(task_id).is_none() {
            self.metrics.record_callback_discarded();
            return Ok(CallbackAck::Discarded);
        }

        let mut task = self.store.load(task_id).await?;
        task.record_error(failure.to_string());
        let disposition =
            forced_disposition.unwrap_or_else(|| classify(&failure.kind, task.retry_count));
        self.resolve_failure(&mut task, disposition).await?;
        Ok(CallbackAck::Applied)
    }

    /// Synthetic failure for an active dispatch whose deadline passed
    /// without a callback
    pub async fn apply_timeout(&self, task_id: Uuid) -> Result<()> {
        let _guard = self.guards.lock(task_id).await;
        // A callback may have resolved the dispatch while the sweep was
        // scanning; losing that race is a no-op here.
        if self.registry.remove(task_id).is_none() {
            return Ok(());
        }

        let mut task = self.store.load(task_id).await?;
        task.status = next_state(task_id, task.status, &TaskEvent::Timeout)?;
        task.record_error(format!(
            "dispatch deadline exceeded after {}s",
            task.timeout_seconds
        ));
        task.last_transition_at = Utc::now();
        self.metrics.record_dispatch_timeout();
        self.publisher.publish_lifecycle(LifecycleEvent::new(
            task_id,
            LifecycleEventKind::TimedOut,
            json!({ "timeout_seconds": task.timeout_seconds }),
        ));
        warn!(task_id = %task_id, "⏰ Dispatch timed out");

        // Timeouts are transient unless the retry budget is spent
        self.resolve_failure(&mut task, ErrorDisposition::Retryable)
            .await
    }

    /// Route a failed task to the retry scheduler or the dead-letter store
    /// and persist the transition. Caller holds the task's guard.
    async fn resolve_failure(&self, task: &mut Task, disposition: ErrorDisposition) -> Result<()> {
        let now = Utc::now();
        let error_text = task.last_error.clone().unwrap_or_default();

        if disposition.is_retryable() && task.retries_remaining() {
            task.status = next_state(
                task.id,
                task.status,
                &TaskEvent::FailTransient(error_text.clone()),
            )?;
            task.last_transition_at = now;
            let entry = self
                .retry_scheduler
                .schedule_retry(task.id, task.retry_count, now);
            self.store.save(task).await?;
            self.store
                .append_history(
                    task.id,
                    format!("retry_scheduled not_before={}", entry.not_before),
                )
                .await?;
            self.publisher.publish_lifecycle(LifecycleEvent::new(
                task.id,
                LifecycleEventKind::RetryScheduled,
                json!({
                    "error": error_text,
                    "retry_count": task.retry_count,
                    "not_before": entry.not_before,
                }),
            ));
            self.metrics.record_retry_scheduled();
            warn!(
                task_id = %task.id,
                retry_count = task.retry_count,
                not_before = %entry.not_before,
                "🔁 Transient failure, retry scheduled"
            );
        } else {
            task.status = next_state(
                task.id,
                task.status,
                &TaskEvent::FailPermanent(error_text.clone()),
            )?;
            task.last_transition_at = now;
            self.dead_letter.quarantine(DeadLetterRecord {
                task_id: task.id,
                priority: task.priority,
                payload: task.payload.clone(),
                error_history: task.error_history.clone(),
                failed_at: now,
            });
            self.store.save(task).await?;
            self.store
                .append_history(task.id, "dead_lettered".to_string())
                .await?;
            self.publisher.publish_lifecycle(LifecycleEvent::new(
                task.id,
                LifecycleEventKind::DeadLettered,
                json!({ "error": error_text, "failures": task.error_history.len() }),
            ));
            self.metrics.record_dead_lettered();
            self.guards.release(task.id);
        }
        Ok(())
    }

    // ── Periodic maintenance (driven by background loops) ───────────

    /// Drain due retry entries back into their priority lanes with the
    /// retry counter advanced.
    ///
    /// A failure on one entry never aborts the drain: later entries still
    /// re-enqueue, and the failing entry is restored to the scheduler so
    /// the next poll picks it up again.
    pub async fn poll_due_retries(&self) -> Result<usize> {
        let due = self.retry_scheduler.poll_due(Utc::now());
        let mut requeued = 0;
        for entry in due {
            let _guard = self.guards.lock(entry.task_id).await;
            let mut task = match self.store.load(entry.task_id).await {
                Ok(task) => task,
                Err(e) => {
                    warn!(task_id = %entry.task_id, error = %e, "Dropping retry entry without record");
                    continue;
                }
            };
            if task.status != TaskState::RetryScheduled {
                // Cancelled between scheduling and the poll
                continue;
            }
            task.retry_count += 1;
            task.status = match next_state(task.id, task.status, &TaskEvent::Requeue) {
                Ok(state) => state,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Dropping retry entry on rejected transition");
                    continue;
                }
            };
            task.last_transition_at = Utc::now();
            // Persist before the lane insert so a claimer never reads a
            // stale RetryScheduled record for a queued entry.
            if let Err(e) = self.store.save(&task).await {
                warn!(task_id = %task.id, error = %e, "Record save failed; restoring retry entry");
                self.retry_scheduler.restore(entry);
                continue;
            }
            self.queue.enqueue(QueuedEntry::new(task.id, task.priority));
            if let Err(e) = self
                .store
                .append_history(task.id, format!("requeued retry_count={}", task.retry_count))
                .await
            {
                warn!(task_id = %task.id, error = %e, "History append failed after requeue");
            }
            self.publisher.publish_lifecycle(LifecycleEvent::new(
                task.id,
                LifecycleEventKind::Queued,
                json!({ "retry_count": task.retry_count }),
            ));
            requeued += 1;
        }
        Ok(requeued)
    }

    /// Force synthetic failures for active dispatches past their deadline
    pub async fn sweep_expired(&self) -> usize {
        let expired = self.registry.expired(Utc::now());
        let mut swept = 0;
        for task_id in expired {
            match self.apply_timeout(task_id).await {
                Ok(()) => swept += 1,
                Err(e) => error!(task_id = %task_id, error = %e, "Timeout sweep failed"),
            }
        }
        swept
    }

    /// Startup reconciliation: any record left in a non-terminal state by a
    /// previous process is put back in its lane. At-least-once semantics
    /// permit treating an interrupted dispatch as never sent.
    pub async fn recover(&self) -> Result<usize> {
        let incomplete = self.store.load_incomplete().await?;
        let mut recovered = 0;
        for mut task in incomplete {
            // Out-of-band reconciliation: the live structures are empty
            // after a restart, so the record is moved straight back to
            // Queued regardless of where it was interrupted.
            task.status = TaskState::Queued;
            task.last_transition_at = Utc::now();
            self.store.save(&task).await?;
            self.store
                .append_history(task.id, "recovered to queue after restart".to_string())
                .await?;
            self.queue.enqueue(QueuedEntry::new(task.id, task.priority));
            self.publisher.publish_lifecycle(LifecycleEvent::new(
                task.id,
                LifecycleEventKind::Queued,
                json!({ "recovered": true }),
            ));
            recovered += 1;
        }
        if recovered > 0 {
            info!(recovered, "🔄 Recovered incomplete tasks into the queue");
        }
        Ok(recovered)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Spawn the dispatch workers, the timeout sweep, and the retry poller
    pub fn start(self: &Arc<Self>) -> OrchestratorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::new();

        for worker_id in 0..self.config.dispatch.workers {
            handles.push(tokio::spawn(dispatcher::worker_loop(
                Arc::clone(self),
                worker_id,
                shutdown_rx.clone(),
            )));
        }
        handles.push(tokio::spawn(timeout_sweeper::sweep_loop(
            Arc::clone(self),
            Duration::from_millis(self.config.dispatch.sweep_interval_ms),
            shutdown_rx.clone(),
        )));
        handles.push(tokio::spawn(timeout_sweeper::retry_poll_loop(
            Arc::clone(self),
            Duration::from_millis(self.config.dispatch.retry_poll_interval_ms),
            shutdown_rx,
        )));

        info!(
            workers = self.config.dispatch.workers,
            "🚀 Orchestrator started"
        );
        OrchestratorHandle {
            shutdown: shutdown_tx,
            handles,
        }
    }
}

/// Handle to the orchestrator's background loops
pub struct OrchestratorHandle {
    shutdown: watch::Sender<bool>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl OrchestratorHandle {
    /// Signal every loop to stop and wait for them to drain
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("🛑 Orchestrator stopped");
    }
}
