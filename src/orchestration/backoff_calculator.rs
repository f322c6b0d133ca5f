//! # Backoff Calculator
//!
//! Exponential backoff for retry scheduling: `delay = base * 2^attempt`,
//! capped. The base and cap are configuration; the defaults produce the
//! 60s / 120s / 240s / 480s ladder.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for retry backoff growth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Base delay in seconds for the first retry
    pub base_delay_seconds: u64,
    /// Maximum delay cap in seconds
    pub max_delay_seconds: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_seconds: 60,
            max_delay_seconds: 480,
        }
    }
}

/// Computes capped exponential retry delays
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    config: BackoffConfig,
}

impl BackoffCalculator {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(BackoffConfig::default())
    }

    /// Delay before the retry following failure number `attempt` (0-based).
    ///
    /// Saturates at the configured cap, including for attempt counts large
    /// enough to overflow the doubling.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let seconds = self
            .config
            .base_delay_seconds
            .saturating_mul(multiplier)
            .min(self.config.max_delay_seconds);
        Duration::from_secs(seconds)
    }
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::with_defaults()
    }
}
