//! Retry policy for the sync loop.
//!
//! # Responsibilities
//! - Decide how long to wait after the n-th consecutive failure
//! - Bound the number of startup attempts
//!
//! # Design Decisions
//! - Fixed delay by default: the configured `delay_time` between attempts
//! - Exponential delay is opt-in and capped by `max_backoff`
//! - Steady-state retries are unbounded; only startup has an attempt limit

use std::time::Duration;

use crate::config::{BackoffStrategy, ClientEndpointConfig};
use crate::resilience::backoff::calculate_backoff;

/// Delay schedule applied after failed attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Base delay between attempts.
    pub delay: Duration,
    /// Growth of the delay across consecutive failures.
    pub strategy: BackoffStrategy,
    /// Upper bound for exponential growth.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Always wait `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            strategy: BackoffStrategy::Fixed,
            max_delay: delay,
        }
    }

    /// Double from `delay` up to `max_delay`.
    pub fn exponential(delay: Duration, max_delay: Duration) -> Self {
        Self {
            delay,
            strategy: BackoffStrategy::Exponential,
            max_delay,
        }
    }

    pub fn from_config(config: &ClientEndpointConfig) -> Self {
        match config.backoff {
            BackoffStrategy::Fixed => Self::fixed(config.retry_delay()),
            BackoffStrategy::Exponential => {
                Self::exponential(config.retry_delay(), config.max_backoff_delay())
            }
        }
    }

    /// Delay to wait after the `failures`-th consecutive failure.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        match self.strategy {
            BackoffStrategy::Fixed => self.delay,
            BackoffStrategy::Exponential => calculate_backoff(
                failures,
                duration_ms(self.delay),
                duration_ms(self.max_delay),
            ),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
