//! Collaborator service interfaces
//!
//! The saga treats every collaborator as a black box behind a trait object.
//! Each call is individually atomic from the saga's point of view; whatever
//! concurrency control a collaborator needs is its own business.
//!
//! Return convention, shared by all fallible operations:
//! - `Ok(true)` - the operation took effect
//! - `Ok(false)` - definitive refusal (e.g. insufficient funds); retrying is
//!   pointless
//! - `Err(_)` - a fault the resilience wrapper may retry

pub mod asset;
pub mod fee;
pub mod ledger;
pub mod publisher;
pub mod wallet;

#[cfg(test)]
pub mod mock;

pub use asset::InMemoryAssetService;
pub use fee::StandardFeeService;
pub use ledger::InMemoryLedgerService;
pub use publisher::ChannelPublisher;
pub use wallet::InMemoryWalletService;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::SettlementError;
use crate::messages::{BalanceUpdateMessage, SettlementCompletedMessage, SettlementFailedMessage};
use crate::models::{MakerSide, SettlementTransaction};

/// Custody holds: lock/unlock a user's assets for an in-flight settlement.
#[async_trait]
pub trait AssetService: Send + Sync {
    async fn lock_assets(
        &self,
        user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError>;

    async fn unlock_assets(
        &self,
        user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError>;

    async fn get_balance(&self, user_id: &str, symbol: &str) -> Result<Decimal, SettlementError>;
}

/// Fund movements: the transfer itself plus fee deduction/refund.
#[async_trait]
pub trait WalletService: Send + Sync {
    async fn transfer(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError>;

    async fn deduct_fee(
        &self,
        user_id: &str,
        symbol: &str,
        fee: Decimal,
    ) -> Result<bool, SettlementError>;

    async fn refund_fee(
        &self,
        user_id: &str,
        symbol: &str,
        fee: Decimal,
    ) -> Result<bool, SettlementError>;
}

/// Fee computation for one trade.
#[async_trait]
pub trait FeeService: Send + Sync {
    /// Returns `(buyer_fee, seller_fee)`.
    async fn calculate_fees(
        &self,
        symbol: &str,
        price: Decimal,
        quantity: Decimal,
        maker_side: MakerSide,
    ) -> Result<(Decimal, Decimal), SettlementError>;
}

/// Durable record of settled trades.
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn record_transaction(
        &self,
        transaction: &SettlementTransaction,
    ) -> Result<bool, SettlementError>;

    async fn get_transaction(
        &self,
        trade_id: &str,
    ) -> Result<Option<SettlementTransaction>, SettlementError>;
}

/// Outbound notification sink. Fire-and-forget from the saga's perspective:
/// callers log failures and move on, they never escalate them.
#[async_trait]
pub trait SettlementPublisher: Send + Sync {
    async fn publish_completed(
        &self,
        message: &SettlementCompletedMessage,
    ) -> Result<(), SettlementError>;

    async fn publish_balance_update(
        &self,
        message: &BalanceUpdateMessage,
    ) -> Result<(), SettlementError>;

    async fn publish_failed(
        &self,
        message: &SettlementFailedMessage,
    ) -> Result<(), SettlementError>;
}
