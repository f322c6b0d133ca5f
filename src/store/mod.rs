//! # Task Record Store
//!
//! Narrow interface to the durable task-record store used for status reads
//! and audit history. Persistence mechanics are out of scope; the default
//! implementation is in-memory, and the orchestrator only talks through the
//! trait so the backend is swappable.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{DispatchError, Result};
use crate::models::Task;

/// Canonical task-record access used by the orchestrator
#[async_trait]
pub trait TaskRecordStore: Send + Sync {
    /// Load a task's canonical record
    async fn load(&self, task_id: Uuid) -> Result<Task>;

    /// Persist the task's current state
    async fn save(&self, task: &Task) -> Result<()>;

    /// Append an audit line to the task's history
    async fn append_history(&self, task_id: Uuid, line: String) -> Result<()>;

    /// Records in a non-terminal state, for startup reconciliation
    async fn load_incomplete(&self) -> Result<Vec<Task>>;
}

/// In-memory record store backed by concurrent maps
#[derive(Debug, Default)]
pub struct InMemoryTaskRecordStore {
    records: DashMap<Uuid, Task>,
    history: DashMap<Uuid, Vec<String>>,
}

impl InMemoryTaskRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit trail for a task (test/operator support)
    pub fn history(&self, task_id: Uuid) -> Vec<String> {
        self.history
            .get(&task_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskRecordStore for InMemoryTaskRecordStore {
    async fn load(&self, task_id: Uuid) -> Result<Task> {
        self.records
            .get(&task_id)
            .map(|t| t.clone())
            .ok_or(DispatchError::TaskNotFound(task_id))
    }

    async fn save(&self, task: &Task) -> Result<()> {
        self.records.insert(task.id, task.clone());
        Ok(())
    }

    async fn append_history(&self, task_id: Uuid, line: String) -> Result<()> {
        self.history.entry(task_id).or_default().push(line);
        Ok(())
    }

    async fn load_incomplete(&self) -> Result<Vec<Task>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| !entry.status.is_terminal())
            .map(|entry| entry.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;
    use crate::state_machine::TaskState;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let store = InMemoryTaskRecordStore::new();
        let task = Task::new(TaskPriority::High, json!({"n": 1}), 3, 30);
        store.save(&task).await.unwrap();

        let loaded = store.load(task.id).await.unwrap();
        assert_eq!(loaded.id, task.id);
        assert_eq!(loaded.payload["n"], 1);
    }

    #[tokio::test]
    async fn test_load_missing_task() {
        let store = InMemoryTaskRecordStore::new();
        let err = store.load(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DispatchError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_history_accumulates() {
        let store = InMemoryTaskRecordStore::new();
        let id = Uuid::new_v4();
        store.append_history(id, "queued".into()).await.unwrap();
        store.append_history(id, "dispatch".into()).await.unwrap();
        assert_eq!(store.history(id), vec!["queued", "dispatch"]);
    }

    #[tokio::test]
    async fn test_load_incomplete_skips_terminal() {
        let store = InMemoryTaskRecordStore::new();
        let live = Task::new(TaskPriority::Low, json!({}), 3, 30);
        let mut done = Task::new(TaskPriority::Low, json!({}), 3, 30);
        done.status = TaskState::Completed;
        store.save(&live).await.unwrap();
        store.save(&done).await.unwrap();

        let incomplete = store.load_incomplete().await.unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].id, live.id);
    }
}
