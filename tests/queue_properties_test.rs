//! Property tests for the queue-side ordering guarantees.

use proptest::prelude::*;
use uuid::Uuid;

use dispatchq::models::{QueuedEntry, TaskPriority};
use dispatchq::orchestration::{BackoffCalculator, BackoffConfig};
use dispatchq::queue::PriorityQueueStore;

fn arb_priority() -> impl Strategy<Value = TaskPriority> {
    prop_oneof![
        Just(TaskPriority::Urgent),
        Just(TaskPriority::High),
        Just(TaskPriority::Medium),
        Just(TaskPriority::Low),
    ]
}

proptest! {
    /// Dequeue is strict priority order, FIFO within each lane.
    #[test]
    fn dequeue_order_is_priority_then_fifo(priorities in prop::collection::vec(arb_priority(), 0..64)) {
        let queue = PriorityQueueStore::new();
        let mut per_lane: [Vec<Uuid>; 4] = Default::default();

        for priority in &priorities {
            let entry = QueuedEntry::new(Uuid::new_v4(), *priority);
            per_lane[priority.lane_index()].push(entry.task_id);
            queue.enqueue(entry);
        }

        let expected: Vec<Uuid> = per_lane.into_iter().flatten().collect();
        let mut drained = Vec::new();
        while let Some(entry) = queue.try_dequeue() {
            drained.push(entry.task_id);
        }

        prop_assert_eq!(drained, expected);
        prop_assert!(queue.is_empty());
    }

    /// Backoff delays never shrink with the attempt count and never exceed
    /// the cap.
    #[test]
    fn backoff_is_monotone_and_capped(
        base in 1u64..600,
        extra in 0u64..3600,
        attempts in 1u32..80,
    ) {
        let cap = base + extra;
        let calc = BackoffCalculator::new(BackoffConfig {
            base_delay_seconds: base,
            max_delay_seconds: cap,
        });

        let mut previous = std::time::Duration::ZERO;
        for attempt in 0..attempts {
            let delay = calc.delay_for_attempt(attempt);
            prop_assert!(delay >= previous);
            prop_assert!(delay.as_secs() <= cap);
            prop_assert!(delay.as_secs() >= base.min(cap));
            previous = delay;
        }
    }
}
