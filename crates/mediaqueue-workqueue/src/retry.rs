//! Retry of store operations that hit transient failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use mediaqueue_config::RetryConfig;

use crate::error::QueueError;

/// Fixed-delay retry with random jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before giving up, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub base_delay: Duration,
    /// Upper bound of the jitter added to every delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_jitter: config.max_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Delay before the next attempt: base plus uniform jitter in `[0, max_jitter]`.
    pub fn delay(&self) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=jitter_ms)
        };
        self.base_delay + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. Failures are logged and collapse to `None`.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueueError>>,
    {
        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Some(value),
                Err(e) if !e.is_retryable() => {
                    debug!(operation, error = %e, "Store operation failed, not retrying");
                    return None;
                }
                Err(e) if attempt == self.max_attempts => {
                    error!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Store operation failed after all retries"
                    );
                    return None;
                }
                Err(e) => {
                    let delay = self.delay();
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Store operation failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
        None
    }
}
