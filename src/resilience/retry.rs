//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::StepOutcome;
use crate::config::ResilienceConfig;
use crate::error::SettlementError;

/// Retry policy: up to `max_retries` extra attempts, sleeping
/// `base_delay * 2^n` before retry n (2s, 4s, 8s with the defaults).
///
/// Only faults classified retryable are re-attempted; validation and
/// precondition failures return immediately since the input will not change.
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs(config.backoff_base_secs),
        )
    }

    /// Drive `op` until it succeeds, faults non-retryably, or retries are
    /// exhausted. The outcome reports the retries performed so the caller can
    /// accumulate them on its transaction context.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> StepOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SettlementError>>,
    {
        let mut retries = 0;

        loop {
            match op(retries).await {
                Ok(value) => {
                    return StepOutcome {
                        result: Ok(value),
                        retries,
                    };
                }
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    let backoff = self.base_delay * 2u32.pow(retries);
                    warn!(
                        retry = retries,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "transient fault, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return StepOutcome {
                        result: Err(e),
                        retries,
                    };
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}
