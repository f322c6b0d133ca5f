//! # Priority Queue Store
//!
//! Four FIFO lanes (urgent/high/medium/low). Enqueue is O(1) and never
//! blocks; dequeue pops the highest-priority non-empty lane in a single
//! critical section, or parks on a [`Notify`] until an item arrives or the
//! timeout elapses. Strict priority across lanes, strict FIFO within a lane,
//! no starvation prevention.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::models::{QueuedEntry, TaskPriority};

/// Lane-array priority queue with a blocking (timeout-bounded) dequeue
#[derive(Debug)]
pub struct PriorityQueueStore {
    // One VecDeque per lane, indexed by TaskPriority::lane_index.
    // Never held across an .await.
    lanes: Mutex<[VecDeque<QueuedEntry>; 4]>,
    notify: Notify,
}

impl PriorityQueueStore {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Default::default()),
            notify: Notify::new(),
        }
    }

    /// Append an entry to its priority lane and wake one waiting dequeuer
    pub fn enqueue(&self, entry: QueuedEntry) {
        let mut lanes = self.lanes.lock();
        trace!(
            task_id = %entry.task_id,
            priority = %entry.priority,
            "Enqueued task"
        );
        lanes[entry.priority.lane_index()].push_back(entry);
        drop(lanes);
        self.notify.notify_one();
    }

    /// Pop the head of the highest-priority non-empty lane.
    ///
    /// The pop is a single atomic operation under the lane lock; two
    /// concurrent callers can never receive the same entry.
    pub fn try_dequeue(&self) -> Option<QueuedEntry> {
        let mut lanes = self.lanes.lock();
        for priority in TaskPriority::lanes_in_priority_order() {
            if let Some(entry) = lanes[priority.lane_index()].pop_front() {
                return Some(entry);
            }
        }
        None
    }

    /// Dequeue, waiting up to `timeout` for an entry when all lanes are empty.
    ///
    /// Returns `None` on timeout. Wakeups race with other dequeuers, so the
    /// loop re-checks the lanes after every notification.
    pub async fn dequeue(&self, timeout: Duration) -> Option<QueuedEntry> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(entry) = self.try_dequeue() {
                return Some(entry);
            }
            let notified = self.notify.notified();
            // Re-check: an enqueue may have landed between the failed pop
            // and registering interest in the notification.
            if let Some(entry) = self.try_dequeue() {
                return Some(entry);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Remove a queued entry by task id (cancellation path)
    pub fn remove(&self, task_id: Uuid) -> Option<QueuedEntry> {
        let mut lanes = self.lanes.lock();
        for lane in lanes.iter_mut() {
            if let Some(pos) = lane.iter().position(|e| e.task_id == task_id) {
                debug!(task_id = %task_id, "Removed queued entry");
                return lane.remove(pos);
            }
        }
        None
    }

    /// Total entries across all lanes
    pub fn len(&self) -> usize {
        let lanes = self.lanes.lock();
        lanes.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PriorityQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(priority: TaskPriority) -> QueuedEntry {
        QueuedEntry::new(Uuid::new_v4(), priority)
    }

    #[test]
    fn test_strict_priority_then_fifo() {
        let queue = PriorityQueueStore::new();
        let low_a = entry(TaskPriority::Low);
        let high_b = entry(TaskPriority::High);
        let urgent_c = entry(TaskPriority::Urgent);
        let high_d = entry(TaskPriority::High);

        queue.enqueue(low_a.clone());
        queue.enqueue(high_b.clone());
        queue.enqueue(urgent_c.clone());
        queue.enqueue(high_d.clone());

        let order: Vec<Uuid> = std::iter::from_fn(|| queue.try_dequeue())
            .map(|e| e.task_id)
            .collect();
        assert_eq!(
            order,
            vec![urgent_c.task_id, high_b.task_id, high_d.task_id, low_a.task_id]
        );
    }

    #[test]
    fn test_try_dequeue_empty() {
        let queue = PriorityQueueStore::new();
        assert!(queue.try_dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_by_id() {
        let queue = PriorityQueueStore::new();
        let a = entry(TaskPriority::Medium);
        let b = entry(TaskPriority::Medium);
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());

        assert_eq!(queue.remove(a.task_id).unwrap().task_id, a.task_id);
        assert!(queue.remove(a.task_id).is_none());
        assert_eq!(queue.try_dequeue().unwrap().task_id, b.task_id);
    }

    #[tokio::test]
    async fn test_dequeue_times_out_when_empty() {
        let queue = PriorityQueueStore::new();
        let popped = queue.dequeue(Duration::from_millis(20)).await;
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_enqueue() {
        let queue = Arc::new(PriorityQueueStore::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let e = entry(TaskPriority::Urgent);
        queue.enqueue(e.clone());

        let popped = waiter.await.unwrap().unwrap();
        assert_eq!(popped.task_id, e.task_id);
    }

    #[tokio::test]
    async fn test_concurrent_dequeuers_never_share_an_entry() {
        let queue = Arc::new(PriorityQueueStore::new());
        let mut expected = std::collections::HashSet::new();
        for _ in 0..100 {
            let e = entry(TaskPriority::Medium);
            expected.insert(e.task_id);
            queue.enqueue(e);
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(e) = queue.try_dequeue() {
                    seen.push(e.task_id);
                    tokio::task::yield_now().await;
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        assert_eq!(all.len(), 100, "each entry dequeued exactly once");
        assert_eq!(all.iter().collect::<std::collections::HashSet<_>>().len(), 100);
        assert!(all.iter().all(|id| expected.contains(id)));
    }
}
