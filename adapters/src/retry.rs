//! Retry policy shared by all HTTP-backed providers.
//!
//! Waits grow exponentially between attempts and are clamped to a window;
//! only errors that `AdapterError::is_retryable` accepts are retried.

use crate::errors::AdapterResult;
use log::warn;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl RetryPolicy {
    /// `max_retries` extra attempts after the first one, waiting 2s..10s in between.
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            min_wait: Duration::from_secs(2),
            max_wait: Duration::from_secs(10),
        }
    }

    pub fn no_wait(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    /// Wait after the given (1-based) failed attempt: `2^(attempt-1)` seconds, clamped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_secs(exp).clamp(self.min_wait, self.max_wait)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> AdapterResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AdapterResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let wait = self.backoff(attempt);
                    warn!(
                        "{operation} failed (attempt {attempt}/{}), retrying in {:?}: {err}",
                        self.max_attempts, wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
