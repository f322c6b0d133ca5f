//! # Execution Error Classification
//!
//! Total classification of execution failures into retryable vs permanent.
//! The dispatch loop never crashes on an unrecognized error: unknown kinds
//! are retried once and treated as permanent thereafter, matching the
//! conservative-retry intent of the failure policy.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::orchestration::types::FailureKind;

/// Handling verdict for a failed execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDisposition {
    /// May succeed on retry; subject to the backoff policy and retry budget
    Retryable,
    /// Will never succeed; dead-letter immediately
    Permanent,
}

impl ErrorDisposition {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// Classify a failure kind given how many retries the task has consumed.
///
/// Pure and total: every kind resolves to a disposition.
pub fn classify(kind: &FailureKind, retry_count: u32) -> ErrorDisposition {
    let disposition = match kind {
        FailureKind::Network
        | FailureKind::RateLimited
        | FailureKind::Interrupted
        | FailureKind::Timeout => ErrorDisposition::Retryable,

        FailureKind::MalformedInput
        | FailureKind::PermissionDenied
        | FailureKind::Cancelled => ErrorDisposition::Permanent,

        // Unrecognized errors get one conservative retry, then stop
        FailureKind::Unknown(label) => {
            debug!(label = %label, retry_count, "Classifying unrecognized failure kind");
            if retry_count == 0 {
                ErrorDisposition::Retryable
            } else {
                ErrorDisposition::Permanent
            }
        }
    };
    disposition
}
