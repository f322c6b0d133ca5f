//! # Dead-Letter Store
//!
//! Append-only quarantine for tasks that exhausted their retries or failed
//! permanently. The only way back into the live system is the operator
//! `requeue` path, which takes the record out of quarantine.

use parking_lot::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::models::DeadLetterRecord;

/// Append store of quarantined tasks, newest last
#[derive(Debug, Default)]
pub struct DeadLetterStore {
    records: RwLock<Vec<DeadLetterRecord>>,
}

impl DeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a quarantine record
    pub fn quarantine(&self, record: DeadLetterRecord) {
        warn!(
            task_id = %record.task_id,
            failures = record.error_history.len(),
            "💀 Task dead-lettered"
        );
        self.records.write().push(record);
    }

    /// Most recent records, newest first, up to `limit`
    pub fn list(&self, limit: usize) -> Vec<DeadLetterRecord> {
        let records = self.records.read();
        records.iter().rev().take(limit).cloned().collect()
    }

    /// Fetch a record without removing it
    pub fn get(&self, task_id: Uuid) -> Option<DeadLetterRecord> {
        self.records
            .read()
            .iter()
            .find(|r| r.task_id == task_id)
            .cloned()
    }

    /// Remove and return a record - the operator requeue path
    pub fn take(&self, task_id: Uuid) -> Option<DeadLetterRecord> {
        let mut records = self.records.write();
        let pos = records.iter().position(|r| r.task_id == task_id)?;
        Some(records.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
