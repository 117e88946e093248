//! Settlement saga
//!
//! Drives one matched trade through the fixed five-step sequence, each step
//! guarded by the resilience wrapper, with flag-driven compensation when a
//! step definitively fails.
//!
//! # State Machine
//!
//! ```text
//! PENDING → LOCKED → PROCESSING → FEE_DISCOUNT → COMPLETED
//!    │         │          │             │
//!    └─────────┴──────────┴─────────────┴──▶ FAILED (rollback)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Flags over state**: compensation is decided by the progress flags,
//!    never by `state` alone - `state` may lag or lead at the failure point
//! 2. **Reverse order**: undo transfer, then fees, then locks
//! 3. **Best-effort rollback**: a failed undo is logged and the remaining
//!    undos still run
//! 4. **Terminal guarantee**: the forced transition to FAILED is never
//!    retried or blocked by an open breaker

pub mod saga;
pub mod states;

#[cfg(test)]
mod integration_tests;

pub use saga::SettlementCoordinator;
pub use states::{CompletedState, FeeDiscountState, LockedState, PendingState, ProcessingState};
