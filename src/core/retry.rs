//! Bounded retry policy for record store writes.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::core::error::StoreError;

/// Decides whether an error should stop retrying immediately.
pub type AbortPredicate = fn(&StoreError) -> bool;

/// Stops on anything that is not transient.
#[must_use]
pub const fn abort_unless_transient(err: &StoreError) -> bool {
    !err.is_transient()
}

/// Retry policy passed into store operations: a capped attempt count, a fixed
/// backoff between attempts, and an abort predicate.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    abort_on: AbortPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    /// Fixed backoff, at least one attempt, aborting on non-transient errors.
    #[must_use]
    pub const fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            backoff,
            abort_on: abort_unless_transient,
        }
    }

    /// Single attempt, no waiting.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Replace the abort predicate.
    #[must_use]
    pub fn with_abort_predicate(mut self, abort_on: AbortPredicate) -> Self {
        self.abort_on = abort_on;
        self
    }

    /// Policy described by configuration.
    #[must_use]
    pub const fn from_config(cfg: &RetryConfig) -> Self {
        Self::fixed(cfg.max_attempts, Duration::from_millis(cfg.backoff_ms))
    }

    /// Maximum attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt number `attempt` (1-based). The first attempt never waits.
    #[must_use]
    pub const fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff
        }
    }

    /// Run `op` until it succeeds, the predicate aborts, or attempts run out.
    /// Returns the last error on failure.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if (self.abort_on)(&err) => {
                    tracing::warn!(operation, attempt, error = %err, "store call aborted");
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %err,
                        "store call retries exhausted"
                    );
                    return Err(err);
                }
                Err(err) => {
                    tracing::debug!(
                        operation,
                        attempt,
                        error = %err,
                        "store call failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.delay_before(attempt)).await;
                }
            }
        }
    }
}
