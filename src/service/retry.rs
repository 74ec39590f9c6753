//! Bounded retry for persistence writes.

use std::future::Future;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::error::RelayError;

/// Retries a fallible operation a fixed number of times with linear
/// backoff, then hands back the last error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy making at most `attempts` tries (at least one),
    /// sleeping `backoff * n` after the n-th failure.
    #[must_use]
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Policy described by `PERSIST_RETRY_ATTEMPTS` and
    /// `PERSIST_RETRY_BACKOFF_MS`.
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.persist_retry_attempts,
            Duration::from_millis(config.persist_retry_backoff_ms),
        )
    }

    /// Maximum number of tries.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Runs `op` until it succeeds or the attempts are used up.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt.
    pub async fn run<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T, RelayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts => {
                    tracing::warn!(what, attempt, error = %err, "write failed, retrying");
                    tokio::time::sleep(self.backoff.saturating_mul(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
