//! Bounded retry with exponential backoff for completion calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{AgentError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
            max_delay_ms: 3_000,
            jitter_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
        }
    }

    pub const fn total_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    fn delay(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt).unwrap_or(u32::MAX).min(12);
        let base = self.base_delay_ms.saturating_mul(1u64 << shift);
        let capped = base.min(self.max_delay_ms.max(self.base_delay_ms));
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            (attempt as u64 * 37) % (self.jitter_ms + 1)
        };
        Duration::from_millis(capped.saturating_add(jitter))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. Exhaustion is reported as [`AgentError::ModelUnavailable`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total_attempts = self.total_attempts();
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    if attempt >= total_attempts {
                        tracing::error!(operation, attempts = attempt, error = %err, "retry budget exhausted");
                        return Err(AgentError::ModelUnavailable {
                            attempts: attempt,
                            reason: err.to_string(),
                        });
                    }

                    let delay = self.delay(attempt - 1);
                    tracing::warn!(
                        operation,
                        error = %err,
                        attempt,
                        total_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
