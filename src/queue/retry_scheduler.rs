//! # Retry Scheduler
//!
//! Time-ordered holding area for failed-but-retryable tasks. Entries are
//! keyed by their `not_before` instant so `poll_due` drains in order with a
//! single range scan. Decouples when a failure happened from when it is safe
//! to retry, bounding load on the downstream service during outages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::models::RetryEntry;
use crate::orchestration::backoff_calculator::BackoffCalculator;

/// Ordered store of retry entries, drained by the orchestrator's poll loop
#[derive(Debug)]
pub struct RetryScheduler {
    // Keyed by (not_before, task_id) so equal timestamps still get distinct
    // keys and drain in insertion-id order.
    entries: Mutex<BTreeMap<(DateTime<Utc>, Uuid), RetryEntry>>,
    backoff: BackoffCalculator,
}

impl RetryScheduler {
    pub fn new(backoff: BackoffCalculator) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            backoff,
        }
    }

    /// Park a task until its exponential backoff elapses.
    ///
    /// `attempt` is the task's retry count before the increment that happens
    /// at re-enqueue, so successive failures produce the 60s/120s/240s ladder.
    pub fn schedule_retry(&self, task_id: Uuid, attempt: u32, now: DateTime<Utc>) -> RetryEntry {
        let delay = self.backoff.delay_for_attempt(attempt);
        let entry = RetryEntry {
            task_id,
            not_before: now + chrono::Duration::from_std(delay).unwrap_or_default(),
        };
        debug!(
            task_id = %task_id,
            attempt = attempt,
            delay_secs = delay.as_secs(),
            not_before = %entry.not_before,
            "⏳ Retry scheduled"
        );
        self.entries
            .lock()
            .insert((entry.not_before, task_id), entry.clone());
        entry
    }

    /// Remove and return every entry whose `not_before` has passed
    pub fn poll_due(&self, now: DateTime<Utc>) -> Vec<RetryEntry> {
        let mut entries = self.entries.lock();
        let mut due = Vec::new();
        while let Some((&key, _)) = entries.first_key_value() {
            if key.0 > now {
                break;
            }
            if let Some(entry) = entries.remove(&key) {
                due.push(entry);
            }
        }
        due
    }

    /// Put a drained entry back with its original `not_before`, for callers
    /// that could not complete the re-enqueue
    pub fn restore(&self, entry: RetryEntry) {
        self.entries
            .lock()
            .insert((entry.not_before, entry.task_id), entry);
    }

    /// Remove a scheduled retry by task id (cancellation path)
    pub fn remove(&self, task_id: Uuid) -> Option<RetryEntry> {
        let mut entries = self.entries.lock();
        let key = entries
            .iter()
            .find(|(_, e)| e.task_id == task_id)
            .map(|(&k, _)| k)?;
        entries.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::backoff_calculator::BackoffConfig;

    fn scheduler() -> RetryScheduler {
        RetryScheduler::new(BackoffCalculator::new(BackoffConfig::default()))
    }

    #[test]
    fn test_schedule_uses_exponential_delay() {
        let sched = scheduler();
        let now = Utc::now();
        let first = sched.schedule_retry(Uuid::new_v4(), 0, now);
        let second = sched.schedule_retry(Uuid::new_v4(), 1, now);
        let third = sched.schedule_retry(Uuid::new_v4(), 2, now);

        assert_eq!((first.not_before - now).num_seconds(), 60);
        assert_eq!((second.not_before - now).num_seconds(), 120);
        assert_eq!((third.not_before - now).num_seconds(), 240);
    }

    #[test]
    fn test_poll_due_returns_only_elapsed_entries() {
        let sched = scheduler();
        let now = Utc::now();
        let due_id = Uuid::new_v4();
        let later_id = Uuid::new_v4();
        sched.schedule_retry(due_id, 0, now - chrono::Duration::seconds(120));
        sched.schedule_retry(later_id, 0, now);

        let due = sched.poll_due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].task_id, due_id);
        assert_eq!(sched.len(), 1);

        let rest = sched.poll_due(now + chrono::Duration::seconds(61));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].task_id, later_id);
        assert!(sched.is_empty());
    }

    #[test]
    fn test_poll_due_drains_in_time_order() {
        let sched = scheduler();
        let now = Utc::now();
        let old = Uuid::new_v4();
        let older = Uuid::new_v4();
        sched.schedule_retry(old, 0, now - chrono::Duration::seconds(70));
        sched.schedule_retry(older, 0, now - chrono::Duration::seconds(300));

        let due = sched.poll_due(now);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].task_id, older);
        assert_eq!(due[1].task_id, old);
    }

    #[test]
    fn test_restore_preserves_not_before() {
        let sched = scheduler();
        let now = Utc::now();
        let id = Uuid::new_v4();
        sched.schedule_retry(id, 0, now - chrono::Duration::seconds(120));

        let due = sched.poll_due(now);
        assert_eq!(due.len(), 1);
        assert!(sched.is_empty());

        sched.restore(due[0].clone());
        let again = sched.poll_due(now);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].task_id, id);
    }

    #[test]
    fn test_remove_by_task_id() {
        let sched = scheduler();
        let id = Uuid::new_v4();
        sched.schedule_retry(id, 0, Utc::now());
        assert_eq!(sched.remove(id).unwrap().task_id, id);
        assert!(sched.remove(id).is_none());
        assert!(sched.is_empty());
    }
}
