//! Settlement error types
//!
//! One error enum is shared by the state machine, the resilience layer, and
//! the saga coordinator so retryability can be classified in one place.

use thiserror::Error;

/// Faults that can surface while driving a settlement saga.
///
/// The retry layer only ever retries [`SettlementError::Service`] faults:
/// validation and precondition failures are deterministic, and an open
/// circuit must fail fast by definition.
#[derive(Error, Debug, Clone)]
pub enum SettlementError {
    /// Trade data is unusable (missing ids, non-positive price/quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A step was attempted before its predecessor flags were set.
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// A collaborator call failed in a way that may succeed on retry.
    #[error("{service} call failed: {reason}")]
    Service {
        service: &'static str,
        reason: String,
    },

    /// The circuit breaker is open; the wrapped operation was not invoked.
    #[error("circuit breaker open ({remaining_ms}ms of cooldown remaining)")]
    CircuitOpen { remaining_ms: u64 },

    /// A step id that was never registered with the state machine.
    #[error("unknown state id: {0}")]
    UnknownState(String),
}

impl SettlementError {
    /// Shorthand for a transient collaborator fault.
    pub fn service(service: &'static str, reason: impl Into<String>) -> Self {
        SettlementError::Service {
            service,
            reason: reason.into(),
        }
    }

    /// Whether the retry policy is allowed to re-attempt after this fault.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::Service { .. })
    }
}
