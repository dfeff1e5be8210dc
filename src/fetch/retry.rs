// src/fetch/retry.rs
use std::time::Duration;

use super::FetchError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Decides whether a failed attempt may be retried.
pub type RetryPredicate = fn(&FetchError) -> bool;

fn retry_any(_: &FetchError) -> bool {
    true
}

/// Bounded retry with a constant pause between attempts (no backoff growth).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            retryable: retry_any,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; values below 1 are raised to 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            retryable: retry_any,
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_predicate(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// `attempt` is 1-based and refers to the attempt that just failed.
    pub fn should_retry(&self, attempt: u32, err: &FetchError) -> bool {
        attempt < self.max_attempts && (self.retryable)(err)
    }
}
