//! Retry logic with a fixed delay
//!
//! Tool invocations are retried a fixed number of attempts with the same
//! pause between each, never with growing backoff.

use crate::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub attempts: u32,

    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Create a policy with a single attempt
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Execute an async operation, retrying transient failures
    ///
    /// Errors for which [`crate::MCPError::is_retryable`] is false are
    /// returned at once. When every attempt fails the last error is returned.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt, "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    error!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "Operation failed with non-retryable error"
                    );
                    return Err(e);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        operation = operation_name,
                        attempts,
                        error = %e,
                        "Operation failed on final attempt"
                    );
                    return Err(e);
                }
            }
        }
    }
}
