use crate::config::RetryConfig;
use crate::service::ServiceError;
use std::time::Duration;

/// Decides whether a failed call is attempted again, and after how long.
pub trait RetryPolicy: Send + Sync {
    /// `attempt` is the 1-based number of the call that just failed.
    /// `None` gives up and surfaces `error`.
    fn next_delay(&self, attempt: u32, error: &ServiceError) -> Option<Duration>;
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _attempt: u32, _error: &ServiceError) -> Option<Duration> {
        None
    }
}

/// Doubling backoff for transient errors, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&RetryConfig> for ExponentialBackoff {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32, error: &ServiceError) -> Option<Duration> {
        if attempt >= self.max_attempts || !error.is_transient() {
            return None;
        }

        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_backoff.saturating_mul(factor);
        Some(std::cmp::min(delay, self.max_backoff))
    }
}
