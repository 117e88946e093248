//! State registry and step executor

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::state::State;
use crate::error::SettlementError;

/// Registry of state behaviors plus the single-step / multi-step executors.
pub struct StateMachine<C: Send + Sync> {
    states: HashMap<&'static str, Arc<dyn State<C>>>,
}

impl<C: Send + Sync> StateMachine<C> {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Register a state. Re-registering an id replaces the old behavior.
    pub fn add_state(&mut self, state: Arc<dyn State<C>>) {
        let id = state.id();
        self.states.insert(id, state);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn State<C>>> {
        self.states.get(id)
    }

    /// Execute a single step, surfacing entry faults to the caller.
    ///
    /// - `Ok(true)` - admission passed and the entry action took effect
    /// - `Ok(false)` - unknown id, admission rejected, or definitive refusal;
    ///   nothing side-effecting ran beyond what the entry action reported
    /// - `Err(_)` - the entry action faulted; the caller decides whether to
    ///   retry
    pub async fn try_execute_step(
        &self,
        ctx: &mut C,
        target: &str,
    ) -> Result<bool, SettlementError> {
        let Some(state) = self.states.get(target) else {
            error!(step = target, "step refers to an unregistered state");
            return Ok(false);
        };

        if !state.can_execute(ctx).await {
            warn!(state = state.name(), "step rejected by admission check");
            return Ok(false);
        }

        if !state.on_entry(ctx).await? {
            error!(state = state.name(), "entry action failed");
            return Ok(false);
        }

        info!(state = state.name(), "stage completed");
        Ok(true)
    }

    /// Execute a single step, converting any fault into `false`.
    ///
    /// This is the boolean boundary: callers that drive control flow with
    /// simple branching never see an error from here.
    pub async fn execute_step(&self, ctx: &mut C, target: &str) -> bool {
        match self.try_execute_step(ctx, target).await {
            Ok(done) => done,
            Err(e) => {
                error!(step = target, error = %e, "step execution faulted");
                false
            }
        }
    }

    /// Execute steps in order, fail-fast.
    ///
    /// On the first failing step, that step's compensation runs and the call
    /// returns `false` without attempting later steps.
    pub async fn execute_steps(&self, ctx: &mut C, steps: &[&str]) -> bool {
        for (i, step) in steps.iter().enumerate() {
            info!(
                step = *step,
                position = i + 1,
                total = steps.len(),
                "executing step"
            );

            if !self.execute_step(ctx, step).await {
                error!(step = *step, position = i + 1, "step failed");
                self.rollback_step(ctx, step).await;
                return false;
            }
        }
        true
    }

    /// Run one state's compensation, logging (never propagating) failures.
    pub async fn rollback_step(&self, ctx: &mut C, target: &str) {
        let Some(state) = self.states.get(target) else {
            warn!(step = target, "rollback requested for unregistered state");
            return;
        };

        if let Err(e) = state.rollback(ctx).await {
            error!(state = state.name(), error = %e, "rollback step failed");
        }
    }
}

impl<C: Send + Sync> Default for StateMachine<C> {
    fn default() -> Self {
        Self::new()
    }
}
