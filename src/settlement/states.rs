//! Settlement state behaviors
//!
//! Each state owns the collaborator calls for its stage and the matching
//! compensation. Admission checks look at the predecessor's progress flags,
//! so a step attempted out of order is rejected before any external call.
//!
//! Local undos (buyer lock undone when the seller lock refuses, buyer fee
//! refunded when the seller deduction refuses) happen inside the entry
//! action itself: the progress flags are only set on full stage success, so
//! the saga-level rollback never repeats a local undo.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::error::SettlementError;
use crate::models::{SettlementState, SettlementTransaction};
use crate::services::{AssetService, FeeService, LedgerService, WalletService};
use crate::state_machine::State;

/// Validates trade data and stamps the idempotency key.
pub struct PendingState;

#[async_trait]
impl State<SettlementTransaction> for PendingState {
    fn id(&self) -> &'static str {
        SettlementState::Pending.step_id()
    }

    fn name(&self) -> &'static str {
        SettlementState::Pending.as_str()
    }

    async fn can_execute(&self, ctx: &SettlementTransaction) -> bool {
        ctx.state == SettlementState::Pending
    }

    async fn on_entry(&self, ctx: &mut SettlementTransaction) -> Result<bool, SettlementError> {
        ctx.touch();

        if ctx.trade_id.is_empty() {
            return Err(SettlementError::Validation("trade id is required".into()));
        }
        if ctx.buyer_id.is_empty() || ctx.seller_id.is_empty() {
            return Err(SettlementError::Validation(
                "buyer and seller ids are required".into(),
            ));
        }
        if ctx.price <= Decimal::ZERO || ctx.quantity <= Decimal::ZERO {
            return Err(SettlementError::Validation(
                "price and quantity must be positive".into(),
            ));
        }

        ctx.idempotency_key = Some(format!(
            "settlement:{}:{}",
            ctx.trade_id,
            Utc::now().timestamp_micros()
        ));

        info!(trade_id = %ctx.trade_id, "trade validated and ready for processing");
        Ok(true)
    }
}

/// Locks buyer notional and seller quantity.
pub struct LockedState {
    assets: Arc<dyn AssetService>,
}

impl LockedState {
    pub fn new(assets: Arc<dyn AssetService>) -> Self {
        Self { assets }
    }

    /// Undo the buyer lock after a partial stage failure.
    async fn release_buyer(&self, ctx: &SettlementTransaction) {
        match self
            .assets
            .unlock_assets(&ctx.buyer_id, &ctx.symbol, ctx.notional())
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(trade_id = %ctx.trade_id, "buyer unlock refused"),
            Err(e) => error!(trade_id = %ctx.trade_id, error = %e, "buyer unlock faulted"),
        }
    }
}

#[async_trait]
impl State<SettlementTransaction> for LockedState {
    fn id(&self) -> &'static str {
        SettlementState::Locked.step_id()
    }

    fn name(&self) -> &'static str {
        SettlementState::Locked.as_str()
    }

    async fn can_execute(&self, ctx: &SettlementTransaction) -> bool {
        ctx.state == SettlementState::Pending && ctx.idempotency_key.is_some()
    }

    async fn on_entry(&self, ctx: &mut SettlementTransaction) -> Result<bool, SettlementError> {
        ctx.touch();

        let notional = ctx.notional();
        if !self
            .assets
            .lock_assets(&ctx.buyer_id, &ctx.symbol, notional)
            .await?
        {
            error!(trade_id = %ctx.trade_id, "failed to lock buyer assets");
            return Ok(false);
        }

        match self
            .assets
            .lock_assets(&ctx.seller_id, &ctx.symbol, ctx.quantity)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                // Undo the buyer hold before reporting the stage failure
                self.release_buyer(ctx).await;
                error!(trade_id = %ctx.trade_id, "failed to lock seller assets");
                return Ok(false);
            }
            Err(e) => {
                // A retried attempt re-locks the buyer, so release the hold now
                self.release_buyer(ctx).await;
                return Err(e);
            }
        }

        ctx.is_buyer_locked = true;
        ctx.is_seller_locked = true;
        info!(trade_id = %ctx.trade_id, "assets locked");
        Ok(true)
    }

    async fn rollback(&self, ctx: &mut SettlementTransaction) -> Result<(), SettlementError> {
        if ctx.is_buyer_locked {
            info!(trade_id = %ctx.trade_id, "unlocking buyer assets");
            self.release_buyer(ctx).await;
            ctx.is_buyer_locked = false;
        }

        if ctx.is_seller_locked {
            info!(trade_id = %ctx.trade_id, "unlocking seller assets");
            match self
                .assets
                .unlock_assets(&ctx.seller_id, &ctx.symbol, ctx.quantity)
                .await
            {
                Ok(true) => {}
                Ok(false) => warn!(trade_id = %ctx.trade_id, "seller unlock refused"),
                Err(e) => error!(trade_id = %ctx.trade_id, error = %e, "seller unlock faulted"),
            }
            ctx.is_seller_locked = false;
        }

        Ok(())
    }
}

/// Moves the traded quantity from seller to buyer.
pub struct ProcessingState {
    wallet: Arc<dyn WalletService>,
}

impl ProcessingState {
    pub fn new(wallet: Arc<dyn WalletService>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl State<SettlementTransaction> for ProcessingState {
    fn id(&self) -> &'static str {
        SettlementState::Processing.step_id()
    }

    fn name(&self) -> &'static str {
        SettlementState::Processing.as_str()
    }

    async fn can_execute(&self, ctx: &SettlementTransaction) -> bool {
        ctx.is_buyer_locked && ctx.is_seller_locked
    }

    async fn on_entry(&self, ctx: &mut SettlementTransaction) -> Result<bool, SettlementError> {
        ctx.touch();

        if !self
            .wallet
            .transfer(&ctx.seller_id, &ctx.buyer_id, &ctx.symbol, ctx.quantity)
            .await?
        {
            error!(trade_id = %ctx.trade_id, "failed to transfer assets");
            return Ok(false);
        }

        ctx.is_transfer_completed = true;
        info!(trade_id = %ctx.trade_id, "transfer completed");
        Ok(true)
    }

    async fn rollback(&self, ctx: &mut SettlementTransaction) -> Result<(), SettlementError> {
        if !ctx.is_transfer_completed {
            return Ok(());
        }

        info!(trade_id = %ctx.trade_id, "reversing transfer");
        match self
            .wallet
            .transfer(&ctx.buyer_id, &ctx.seller_id, &ctx.symbol, ctx.quantity)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(trade_id = %ctx.trade_id, "transfer reversal refused"),
            Err(e) => error!(trade_id = %ctx.trade_id, error = %e, "transfer reversal faulted"),
        }
        ctx.is_transfer_completed = false;

        Ok(())
    }
}

/// Computes both fees and deducts them from the parties.
pub struct FeeDiscountState {
    fees: Arc<dyn FeeService>,
    wallet: Arc<dyn WalletService>,
}

impl FeeDiscountState {
    pub fn new(fees: Arc<dyn FeeService>, wallet: Arc<dyn WalletService>) -> Self {
        Self { fees, wallet }
    }
}

#[async_trait]
impl State<SettlementTransaction> for FeeDiscountState {
    fn id(&self) -> &'static str {
        SettlementState::FeeDiscount.step_id()
    }

    fn name(&self) -> &'static str {
        SettlementState::FeeDiscount.as_str()
    }

    async fn can_execute(&self, ctx: &SettlementTransaction) -> bool {
        ctx.is_transfer_completed
    }

    async fn on_entry(&self, ctx: &mut SettlementTransaction) -> Result<bool, SettlementError> {
        ctx.touch();

        let (buyer_fee, seller_fee) = self
            .fees
            .calculate_fees(&ctx.symbol, ctx.price, ctx.quantity, ctx.maker_side)
            .await?;

        if !self
            .wallet
            .deduct_fee(&ctx.buyer_id, &ctx.symbol, buyer_fee)
            .await?
        {
            error!(trade_id = %ctx.trade_id, "failed to deduct buyer fee");
            return Ok(false);
        }

        match self
            .wallet
            .deduct_fee(&ctx.seller_id, &ctx.symbol, seller_fee)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                self.refund_buyer(ctx, buyer_fee).await;
                error!(trade_id = %ctx.trade_id, "failed to deduct seller fee");
                return Ok(false);
            }
            Err(e) => {
                self.refund_buyer(ctx, buyer_fee).await;
                return Err(e);
            }
        }

        ctx.buyer_fee = buyer_fee;
        ctx.seller_fee = seller_fee;
        ctx.is_fee_processed = true;
        info!(
            trade_id = %ctx.trade_id,
            %buyer_fee,
            %seller_fee,
            "fees processed"
        );
        Ok(true)
    }

    async fn rollback(&self, ctx: &mut SettlementTransaction) -> Result<(), SettlementError> {
        if !ctx.is_fee_processed {
            return Ok(());
        }

        info!(trade_id = %ctx.trade_id, "refunding fees");
        self.refund_buyer(ctx, ctx.buyer_fee).await;
        if let Err(e) = self
            .wallet
            .refund_fee(&ctx.seller_id, &ctx.symbol, ctx.seller_fee)
            .await
        {
            error!(trade_id = %ctx.trade_id, error = %e, "seller fee refund faulted");
        }
        ctx.is_fee_processed = false;

        Ok(())
    }
}

impl FeeDiscountState {
    async fn refund_buyer(&self, ctx: &SettlementTransaction, fee: Decimal) {
        if let Err(e) = self
            .wallet
            .refund_fee(&ctx.buyer_id, &ctx.symbol, fee)
            .await
        {
            error!(trade_id = %ctx.trade_id, error = %e, "buyer fee refund faulted");
        }
    }
}

/// Records the settlement in the ledger, then releases both holds.
pub struct CompletedState {
    ledger: Arc<dyn LedgerService>,
    assets: Arc<dyn AssetService>,
}

impl CompletedState {
    pub fn new(ledger: Arc<dyn LedgerService>, assets: Arc<dyn AssetService>) -> Self {
        Self { ledger, assets }
    }
}

#[async_trait]
impl State<SettlementTransaction> for CompletedState {
    fn id(&self) -> &'static str {
        SettlementState::Completed.step_id()
    }

    fn name(&self) -> &'static str {
        SettlementState::Completed.as_str()
    }

    async fn can_execute(&self, ctx: &SettlementTransaction) -> bool {
        ctx.is_fee_processed && ctx.buyer_fee >= Decimal::ZERO && ctx.seller_fee >= Decimal::ZERO
    }

    async fn on_entry(&self, ctx: &mut SettlementTransaction) -> Result<bool, SettlementError> {
        ctx.touch();

        // Persist first: if the ledger refuses, the holds stay in place for
        // the saga-level rollback
        if !self.ledger.record_transaction(ctx).await? {
            error!(trade_id = %ctx.trade_id, "failed to record transaction in ledger");
            return Ok(false);
        }

        for (user_id, amount) in [
            (&ctx.buyer_id, ctx.notional()),
            (&ctx.seller_id, ctx.quantity),
        ] {
            match self.assets.unlock_assets(user_id, &ctx.symbol, amount).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(trade_id = %ctx.trade_id, user_id = %user_id, "post-settlement unlock refused")
                }
                Err(e) => {
                    error!(trade_id = %ctx.trade_id, user_id = %user_id, error = %e, "post-settlement unlock faulted")
                }
            }
        }

        info!(trade_id = %ctx.trade_id, "settlement recorded");
        Ok(true)
    }
}
