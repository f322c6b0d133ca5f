//! # Metrics Collection
//!
//! A single injected metrics collector shared by the orchestrator and its
//! components. Counters are atomics so concurrent workers never lose
//! updates; `snapshot()` produces a serializable point-in-time view for
//! dashboards and tests. No process-wide singletons.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic lifecycle counters, injected into each component
#[derive(Debug, Default)]
pub struct MetricsCollector {
    tasks_submitted: AtomicU64,
    tasks_dispatched: AtomicU64,
    tasks_completed: AtomicU64,
    retries_scheduled: AtomicU64,
    tasks_dead_lettered: AtomicU64,
    dispatch_timeouts: AtomicU64,
    tasks_cancelled: AtomicU64,
    tasks_requeued: AtomicU64,
    circuit_rejections: AtomicU64,
    callbacks_rejected: AtomicU64,
    callbacks_discarded: AtomicU64,
}

/// Point-in-time metrics view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_dispatched: u64,
    pub tasks_completed: u64,
    pub retries_scheduled: u64,
    pub tasks_dead_lettered: u64,
    pub dispatch_timeouts: u64,
    pub tasks_cancelled: u64,
    pub tasks_requeued: u64,
    pub circuit_rejections: u64,
    pub callbacks_rejected: u64,
    pub callbacks_discarded: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_lettered(&self) {
        self.tasks_dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_timeout(&self) {
        self.dispatch_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.tasks_requeued.fetch_add(1, Ordering::Relaxed);
    }

    /// Dispatch shed by the circuit breaker before reaching the network
    pub fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Callback rejected at the boundary (bad signature, malformed body)
    pub fn record_callback_rejected(&self) {
        self.callbacks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Duplicate or late callback acknowledged and dropped
    pub fn record_callback_discarded(&self) {
        self.callbacks_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            tasks_dead_lettered: self.tasks_dead_lettered.load(Ordering::Relaxed),
            dispatch_timeouts: self.dispatch_timeouts.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            tasks_requeued: self.tasks_requeued.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            callbacks_rejected: self.callbacks_rejected.load(Ordering::Relaxed),
            callbacks_discarded: self.callbacks_discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = MetricsCollector::new();
        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_dispatched();
        metrics.record_callback_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_submitted, 2);
        assert_eq!(snapshot.tasks_dispatched, 1);
        assert_eq!(snapshot.callbacks_rejected, 1);
        assert_eq!(snapshot.tasks_completed, 0);
    }

    #[test]
    fn test_concurrent_increments_not_lost() {
        use std::sync::Arc;
        let metrics = Arc::new(MetricsCollector::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    metrics.record_dispatched();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().tasks_dispatched, 8000);
    }
}
