//! # Event System
//!
//! Fire-and-forget fan-out of lifecycle events to subscribers (dashboards,
//! logging, tests). Best-effort only: this is a UI-convenience signal, not
//! the system of record.

pub mod publisher;

pub use publisher::{
    task_channel, EventPublisher, LifecycleEvent, LifecycleEventKind, SYSTEM_CHANNEL,
};
