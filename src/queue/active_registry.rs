//! # Active-Processing Registry
//!
//! In-flight dispatch metadata keyed by task id, with a secondary index from
//! the execution service's correlation id back to the task. `remove` is the
//! single linearization point for resolving a dispatch: whichever of
//! callback, timeout sweep, or cancellation removes the entry first wins, and
//! the others see `None` and no-op.

use dashmap::DashMap;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::ActiveDispatch;

/// Concurrent registry of in-flight dispatches
#[derive(Debug, Default)]
pub struct ActiveRegistry {
    dispatches: DashMap<Uuid, ActiveDispatch>,
    correlations: DashMap<String, Uuid>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly claimed dispatch
    pub fn insert(&self, dispatch: ActiveDispatch) {
        if let Some(correlation_id) = &dispatch.correlation_id {
            self.correlations
                .insert(correlation_id.clone(), dispatch.task_id);
        }
        self.dispatches.insert(dispatch.task_id, dispatch);
    }

    /// Attach the correlation id returned by the execution service
    pub fn set_correlation(&self, task_id: Uuid, correlation_id: String) {
        if let Some(mut dispatch) = self.dispatches.get_mut(&task_id) {
            dispatch.correlation_id = Some(correlation_id.clone());
            self.correlations.insert(correlation_id, task_id);
        }
    }

    /// Map a callback's correlation id to the task it belongs to
    pub fn resolve_correlation(&self, correlation_id: &str) -> Option<Uuid> {
        self.correlations.get(correlation_id).map(|id| *id)
    }

    /// Atomically resolve a dispatch. Exactly one caller gets the entry.
    pub fn remove(&self, task_id: Uuid) -> Option<ActiveDispatch> {
        let (_, dispatch) = self.dispatches.remove(&task_id)?;
        if let Some(correlation_id) = &dispatch.correlation_id {
            self.correlations.remove(correlation_id);
        }
        Some(dispatch)
    }

    pub fn get(&self, task_id: Uuid) -> Option<ActiveDispatch> {
        self.dispatches.get(&task_id).map(|d| d.clone())
    }

    /// Task ids whose dispatch deadline has passed
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.dispatches
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.task_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dispatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_round_trip() {
        let registry = ActiveRegistry::new();
        let dispatch = ActiveDispatch::new(Uuid::new_v4(), 30);
        let task_id = dispatch.task_id;
        registry.insert(dispatch);

        assert!(registry.get(task_id).is_some());
        assert!(registry.remove(task_id).is_some());
        // Second removal no-ops: the idempotency backstop
        assert!(registry.remove(task_id).is_none());
    }

    #[test]
    fn test_correlation_resolution() {
        let registry = ActiveRegistry::new();
        let dispatch = ActiveDispatch::new(Uuid::new_v4(), 30);
        let task_id = dispatch.task_id;
        registry.insert(dispatch);
        registry.set_correlation(task_id, "corr-123".into());

        assert_eq!(registry.resolve_correlation("corr-123"), Some(task_id));
        assert_eq!(registry.resolve_correlation("corr-999"), None);

        registry.remove(task_id);
        // Correlation index is cleaned up with the dispatch
        assert_eq!(registry.resolve_correlation("corr-123"), None);
    }

    #[test]
    fn test_expired_scan() {
        let registry = ActiveRegistry::new();
        let fresh = ActiveDispatch::new(Uuid::new_v4(), 300);
        let mut stale = ActiveDispatch::new(Uuid::new_v4(), 30);
        stale.deadline = Utc::now() - chrono::Duration::seconds(1);
        let stale_id = stale.task_id;
        registry.insert(fresh);
        registry.insert(stale);

        let expired = registry.expired(Utc::now());
        assert_eq!(expired, vec![stale_id]);
    }
}
