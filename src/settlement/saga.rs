//! Settlement Coordinator
//!
//! Orchestrates the saga: drives the fixed forward sequence with each step
//! guarded by the resilience wrapper, and runs the flag-driven rollback when
//! a step definitively fails. This is the only place that mutates
//! `SettlementTransaction::state`.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use super::states::{CompletedState, FeeDiscountState, LockedState, PendingState, ProcessingState};
use crate::config::ResilienceConfig;
use crate::messages::{BalanceUpdateMessage, SettlementCompletedMessage, SettlementFailedMessage};
use crate::models::{SettlementState, SettlementTransaction};
use crate::resilience::ResiliencePolicy;
use crate::services::{AssetService, FeeService, LedgerService, SettlementPublisher, WalletService};
use crate::state_machine::StateMachine;

/// Forward path; each entry is entered only after its step succeeds.
const FORWARD_SEQUENCE: [SettlementState; 5] = [
    SettlementState::Pending,
    SettlementState::Locked,
    SettlementState::Processing,
    SettlementState::FeeDiscount,
    SettlementState::Completed,
];

/// Reverse order for saga-level compensation. Each state's rollback checks
/// its own progress flags, so steps that never ran are no-ops here.
const ROLLBACK_SEQUENCE: [SettlementState; 3] = [
    SettlementState::Processing,
    SettlementState::FeeDiscount,
    SettlementState::Locked,
];

/// Saga orchestrator for one settlement service instance.
///
/// A coordinator is shared by all concurrently running sagas; each saga
/// exclusively owns its own `SettlementTransaction` for its whole lifetime.
pub struct SettlementCoordinator {
    machine: StateMachine<SettlementTransaction>,
    resilience: ResiliencePolicy,
    assets: Arc<dyn AssetService>,
    publisher: Arc<dyn SettlementPublisher>,
}

impl SettlementCoordinator {
    pub fn new(
        assets: Arc<dyn AssetService>,
        wallet: Arc<dyn WalletService>,
        fees: Arc<dyn FeeService>,
        ledger: Arc<dyn LedgerService>,
        publisher: Arc<dyn SettlementPublisher>,
        resilience: &ResilienceConfig,
    ) -> Self {
        let mut machine = StateMachine::new();
        machine.add_state(Arc::new(PendingState));
        machine.add_state(Arc::new(LockedState::new(assets.clone())));
        machine.add_state(Arc::new(ProcessingState::new(wallet.clone())));
        machine.add_state(Arc::new(FeeDiscountState::new(fees, wallet)));
        machine.add_state(Arc::new(CompletedState::new(ledger, assets.clone())));

        Self {
            machine,
            resilience: ResiliencePolicy::from_config(resilience),
            assets,
            publisher,
        }
    }

    /// Settle one trade to a terminal state.
    ///
    /// Returns `true` iff the context reached `Completed`. Never panics and
    /// never propagates an error: failures leave their diagnostics on the
    /// context and are announced via the failure notification.
    pub async fn process(&self, ctx: &mut SettlementTransaction) -> bool {
        info!(
            trade_id = %ctx.trade_id,
            settlement_id = %ctx.id,
            "starting settlement"
        );

        for target in FORWARD_SEQUENCE {
            if !self.advance(ctx, target).await {
                error!(
                    trade_id = %ctx.trade_id,
                    step = target.step_id(),
                    "settlement step failed"
                );
                self.rollback(ctx).await;
                return false;
            }
        }

        self.publish_completion(ctx).await;
        info!(trade_id = %ctx.trade_id, "settlement completed");
        true
    }

    /// Run one guarded step and, on success, advance the recorded state.
    async fn advance(&self, ctx: &mut SettlementTransaction, target: SettlementState) -> bool {
        let step_id = target.step_id();

        // The retry closure must mint a fresh future per attempt, so the
        // context is lent through a mutex rather than captured outright.
        let guarded = tokio::sync::Mutex::new(ctx);
        let outcome = self
            .resilience
            .execute(|_attempt| {
                let machine = &self.machine;
                let guarded = &guarded;
                async move {
                    let mut guard = guarded.lock().await;
                    machine.try_execute_step(&mut **guard, step_id).await
                }
            })
            .await;
        let ctx = guarded.into_inner();

        ctx.retry_count += outcome.retries;

        match outcome.result {
            Ok(true) => {
                ctx.state = target;
                ctx.touch();
                true
            }
            Ok(false) => {
                if ctx.error_message.is_none() {
                    ctx.error_message = Some(format!("{} step failed", step_id));
                }
                false
            }
            Err(e) => {
                ctx.error_message = Some(e.to_string());
                false
            }
        }
    }

    /// Undo every effect recorded by the progress flags, in strict reverse
    /// of the forward order, then force the terminal failure state and
    /// announce it. Never raises; partial undo failures are logged and the
    /// remaining undos still run.
    ///
    /// Each undo clears its flag, so invoking rollback again on the same
    /// context performs no duplicate compensation.
    pub async fn rollback(&self, ctx: &mut SettlementTransaction) {
        info!(trade_id = %ctx.trade_id, "starting rollback");

        let failed_at_state = ctx.state;

        for step in ROLLBACK_SEQUENCE {
            self.machine.rollback_step(ctx, step.step_id()).await;
        }

        // Forced terminal transition: deliberately not guarded by the
        // resilience wrapper so the saga can always fail
        ctx.state = SettlementState::Failed;
        ctx.touch();

        error!(
            trade_id = %ctx.trade_id,
            failed_at = %failed_at_state,
            error = ctx.error_message.as_deref().unwrap_or(""),
            retry_count = ctx.retry_count,
            is_buyer_locked = ctx.is_buyer_locked,
            is_seller_locked = ctx.is_seller_locked,
            is_transfer_completed = ctx.is_transfer_completed,
            is_fee_processed = ctx.is_fee_processed,
            "settlement failed"
        );

        let message = SettlementFailedMessage {
            trade_id: ctx.trade_id.clone(),
            settlement_id: ctx.id.clone(),
            error_message: ctx.error_message.clone().unwrap_or_default(),
            failed_at_state,
            failed_at: Utc::now(),
            retry_count: ctx.retry_count,
        };
        if let Err(e) = self.publisher.publish_failed(&message).await {
            warn!(trade_id = %ctx.trade_id, error = %e, "failed to publish failure notification");
        }

        info!(trade_id = %ctx.trade_id, "rollback complete");
    }

    /// Best-effort completion fan-out: one completed message plus a balance
    /// update per party. Settlement has already committed, so publish
    /// failures are logged and never escalated.
    async fn publish_completion(&self, ctx: &SettlementTransaction) {
        let message = SettlementCompletedMessage {
            trade_id: ctx.trade_id.clone(),
            settlement_id: ctx.id.clone(),
            buyer_id: ctx.buyer_id.clone(),
            seller_id: ctx.seller_id.clone(),
            symbol: ctx.symbol.clone(),
            price: ctx.price,
            quantity: ctx.quantity,
            buyer_fee: ctx.buyer_fee,
            seller_fee: ctx.seller_fee,
            completed_at: Utc::now(),
            maker_side: ctx.maker_side,
        };
        if let Err(e) = self.publisher.publish_completed(&message).await {
            warn!(trade_id = %ctx.trade_id, error = %e, "failed to publish completion");
        }

        for user_id in [&ctx.buyer_id, &ctx.seller_id] {
            let balance = match self.assets.get_balance(user_id, &ctx.symbol).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(trade_id = %ctx.trade_id, user_id = %user_id, error = %e, "balance lookup failed");
                    Decimal::ZERO
                }
            };

            let update = BalanceUpdateMessage {
                user_id: user_id.clone(),
                symbol: ctx.symbol.clone(),
                balance,
                // Holds were released by the completion step
                locked_balance: Decimal::ZERO,
                updated_at: Utc::now(),
                trade_id: ctx.trade_id.clone(),
            };
            if let Err(e) = self.publisher.publish_balance_update(&update).await {
                warn!(trade_id = %ctx.trade_id, user_id = %user_id, error = %e, "failed to publish balance update");
            }
        }
    }
}
