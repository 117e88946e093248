//! State behavior trait

use async_trait::async_trait;

use crate::error::SettlementError;

/// Behavior of one state, scoped to a context of type `C`.
///
/// `on_entry` has three outcomes, and the distinction matters to the caller:
/// - `Ok(true)` - the step took effect
/// - `Ok(false)` - a collaborator definitively refused (no point retrying)
/// - `Err(_)` - a fault; retryable iff [`SettlementError::is_retryable`]
#[async_trait]
pub trait State<C: Send + Sync>: Send + Sync {
    /// Stable identifier used to register and dispatch this state
    fn id(&self) -> &'static str;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    /// Admission check: may this step run against the context as-is?
    /// Must be side-effect free.
    async fn can_execute(&self, ctx: &C) -> bool;

    /// Entry action: perform the step's work and record progress on the
    /// context.
    async fn on_entry(&self, ctx: &mut C) -> Result<bool, SettlementError>;

    /// Compensation action: undo whatever this state's entry recorded.
    /// Default is a no-op for states with nothing to undo.
    async fn rollback(&self, _ctx: &mut C) -> Result<(), SettlementError> {
        Ok(())
    }
}
