//! # Queue Structures
//!
//! The four typed stores a task moves between: priority lanes awaiting
//! dispatch, the time-ordered retry scheduler, the in-flight active registry,
//! and the dead-letter quarantine. Each is a narrow, separately testable
//! store so the backing implementation can change without touching
//! orchestrator logic.

pub mod active_registry;
pub mod dead_letter;
pub mod priority_queue;
pub mod retry_scheduler;

pub use active_registry::ActiveRegistry;
pub use dead_letter::DeadLetterStore;
pub use priority_queue::PriorityQueueStore;
pub use retry_scheduler::RetryScheduler;
