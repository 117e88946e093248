//! Settlement domain models
//!
//! `TradeMatch` is the inbound wire record, `SettlementTransaction` is the
//! mutable context that one saga instance drives to a terminal state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the trade was the passive (maker) order.
///
/// Used by the fee schedule: the maker pays the lower rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MakerSide {
    Buy,
    Sell,
}

impl MakerSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            MakerSide::Buy => "buy",
            MakerSide::Sell => "sell",
        }
    }
}

impl std::fmt::Display for MakerSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Matched trade as delivered by the upstream feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMatch {
    pub trade_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
    pub maker_side: MakerSide,
}

/// Settlement saga states
///
/// Legal forward path: Pending -> Locked -> Processing -> FeeDiscount ->
/// Completed. Any non-terminal state can be forced to Failed by rollback.
/// Terminal states: Completed, Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementState {
    /// Context constructed, trade data not yet validated
    Pending,
    /// Buyer notional and seller quantity are held
    Locked,
    /// Asset transfer seller -> buyer confirmed
    Processing,
    /// Fees computed and deducted from both parties
    FeeDiscount,
    /// Terminal: recorded in the ledger, locks released
    Completed,
    /// Terminal: rollback ran, compensations applied
    Failed,
}

impl SettlementState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementState::Completed | SettlementState::Failed)
    }

    /// Step id used to register/dispatch state behavior in the state machine
    pub fn step_id(&self) -> &'static str {
        match self {
            SettlementState::Pending => "pending",
            SettlementState::Locked => "locked",
            SettlementState::Processing => "processing",
            SettlementState::FeeDiscount => "fee_discount",
            SettlementState::Completed => "completed",
            SettlementState::Failed => "failed",
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementState::Pending => "PENDING",
            SettlementState::Locked => "LOCKED",
            SettlementState::Processing => "PROCESSING",
            SettlementState::FeeDiscount => "FEE_DISCOUNT",
            SettlementState::Completed => "COMPLETED",
            SettlementState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for SettlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One trade being settled: identity, terms, saga position, and the progress
/// flags that drive compensation.
///
/// The flags - not `state` - are the source of truth for rollback: a flag is
/// true only if its forward step actually took effect, and it is cleared
/// again once the matching undo has run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementTransaction {
    /// Settlement id (generated, one per attempt)
    pub id: String,
    /// External trade id from the match feed
    pub trade_id: String,
    pub state: SettlementState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    /// Set on entry to Pending; lets a redelivered attempt be recognized
    pub idempotency_key: Option<String>,

    // Trade terms
    pub buyer_id: String,
    pub seller_id: String,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub maker_side: MakerSide,

    // Settlement results
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,
    pub is_buyer_locked: bool,
    pub is_seller_locked: bool,
    pub is_transfer_completed: bool,
    pub is_fee_processed: bool,
}

impl SettlementTransaction {
    /// Build a fresh Pending context from an inbound trade match.
    pub fn from_trade(trade: &TradeMatch) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            trade_id: trade.trade_id.clone(),
            state: SettlementState::Pending,
            created_at: now,
            updated_at: now,
            error_message: None,
            retry_count: 0,
            idempotency_key: None,
            buyer_id: trade.buyer_id.clone(),
            seller_id: trade.seller_id.clone(),
            symbol: trade.symbol.clone(),
            price: trade.price,
            quantity: trade.quantity,
            maker_side: trade.maker_side,
            buyer_fee: Decimal::ZERO,
            seller_fee: Decimal::ZERO,
            is_buyer_locked: false,
            is_seller_locked: false,
            is_transfer_completed: false,
            is_fee_processed: false,
        }
    }

    /// Buyer-side notional: `price * quantity`
    #[inline]
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Refresh `updated_at`; called on every state entry
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
