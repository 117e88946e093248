//! Resilience wrapper - retry with backoff inside a circuit breaker
//!
//! Composition order matters and is fixed: the breaker is the OUTER layer.
//! One logical attempt runs the full retry burst first, and only an
//! exhausted (or non-retryable) fault counts as a single fault toward the
//! breaker, never one per retry.
//!
//! ```text
//! execute ──▶ breaker.check ──▶ retry loop ──▶ wrapped operation
//!                 │                  │
//!             fail fast        backoff 2^n s
//! ```

pub mod breaker;
pub mod retry;

pub use breaker::CircuitBreaker;
pub use retry::RetryPolicy;

use std::future::Future;

use crate::config::ResilienceConfig;
use crate::error::SettlementError;

/// Result of a guarded execution plus how many retries it took.
#[derive(Debug)]
pub struct StepOutcome<T> {
    pub result: Result<T, SettlementError>,
    pub retries: u32,
}

/// Breaker-outside-retry composition guarding one step at a time.
pub struct ResiliencePolicy {
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl ResiliencePolicy {
    pub fn new(retry: RetryPolicy, breaker: CircuitBreaker) -> Self {
        Self { retry, breaker }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::new(
            RetryPolicy::from_config(config),
            CircuitBreaker::from_config(config),
        )
    }

    /// Run `op` under the composed policy.
    ///
    /// `op` is called with the current retry number (0 on the first attempt)
    /// and must produce a future that owns its captures, so every attempt
    /// starts from a clean closure invocation.
    ///
    /// Only retryable faults feed the breaker: a deterministic validation
    /// failure says nothing about collaborator health.
    pub async fn execute<T, F, Fut>(&self, op: F) -> StepOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SettlementError>>,
    {
        if let Err(e) = self.breaker.check() {
            return StepOutcome {
                result: Err(e),
                retries: 0,
            };
        }

        let outcome = self.retry.run(op).await;

        match &outcome.result {
            Ok(_) => self.breaker.record_success(),
            Err(e) if e.is_retryable() => self.breaker.record_failure(),
            Err(_) => {}
        }

        outcome
    }
}
