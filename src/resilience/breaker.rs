//! Circuit breaker

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

use crate::config::ResilienceConfig;
use crate::error::SettlementError;

#[derive(Debug)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Counts consecutive faults; opens after `failure_threshold` of them and
/// fails fast for `cooldown`. After the cooldown one probe is allowed
/// through (half-open); its success closes the breaker, another fault
/// re-opens it.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::new(
            config.breaker_failure_threshold,
            Duration::from_secs(config.breaker_cooldown_secs),
        )
    }

    /// Gate an attempt: `Err(CircuitOpen)` while the cooldown is running.
    pub fn check(&self) -> Result<(), SettlementError> {
        let state = self.state.lock().unwrap();

        if let Some(opened_at) = state.opened_at {
            let elapsed = opened_at.elapsed();
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Err(SettlementError::CircuitOpen {
                    remaining_ms: remaining.as_millis() as u64,
                });
            }
            info!("circuit breaker half-open, allowing probe");
        }

        Ok(())
    }

    /// Record a successful attempt: closes the breaker and zeroes the count.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        if state.consecutive_failures > 0 || state.opened_at.is_some() {
            info!("circuit breaker reset");
        }
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    /// Record a faulted attempt; opens (or re-opens) at the threshold.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        state.consecutive_failures += 1;

        if state.consecutive_failures >= self.failure_threshold {
            state.opened_at = Some(Instant::now());
            error!(
                consecutive_failures = state.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker opened"
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.check().is_err()
    }
}
