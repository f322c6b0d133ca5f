//! # Data Model
//!
//! Core entities moving through the queue and orchestrator: the [`Task`]
//! itself plus the lightweight per-structure wrappers ([`QueuedEntry`],
//! [`ActiveDispatch`], [`RetryEntry`], [`DeadLetterRecord`]).

pub mod task;

pub use task::{
    ActiveDispatch, DeadLetterRecord, QueuedEntry, RetryEntry, StatusSnapshot, Task, TaskPriority,
};
