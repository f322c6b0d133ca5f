//! # Task State Machine
//!
//! Explicit finite-state machine for the task lifecycle. Transitions are
//! validated against a legal-transition table before any structure or record
//! mutation happens, so an out-of-order callback can never double-transition
//! a task.

pub mod events;
pub mod states;
pub mod task_state_machine;

pub use events::TaskEvent;
pub use states::TaskState;
pub use task_state_machine::next_state;
