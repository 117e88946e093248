//! Messages - outbound settlement notifications
//!
//! These types are what downstream consumers see. Delivery is at-least-once:
//! consumers must deduplicate on `trade_id`/`settlement_id`.
//!
//! # Message Flow
//!
//! ```text
//! Saga ──▶ SettlementCompletedMessage ──▶ downstream (positions, UI)
//!      ──▶ BalanceUpdateMessage ×2     ──▶ balance caches
//!      ──▶ SettlementFailedMessage     ──▶ ops / reconciliation
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{MakerSide, SettlementState};

/// Published once per fully settled trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementCompletedMessage {
    pub trade_id: String,
    pub settlement_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,
    pub completed_at: DateTime<Utc>,
    pub maker_side: MakerSide,
}

/// Published once per rolled-back trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementFailedMessage {
    pub trade_id: String,
    pub settlement_id: String,
    pub error_message: String,
    /// The saga state that was active when the failing step was attempted
    pub failed_at_state: SettlementState,
    pub failed_at: DateTime<Utc>,
    pub retry_count: u32,
}

/// Published per affected party after a completed settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdateMessage {
    pub user_id: String,
    pub symbol: String,
    pub balance: Decimal,
    pub locked_balance: Decimal,
    pub updated_at: DateTime<Utc>,
    pub trade_id: String,
}

/// Union of everything the saga publishes, for channel transport.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum OutboundEvent {
    Completed(SettlementCompletedMessage),
    Failed(SettlementFailedMessage),
    BalanceUpdate(BalanceUpdateMessage),
}

impl OutboundEvent {
    /// Destination topic for broker-backed publishers.
    pub fn topic(&self) -> &'static str {
        match self {
            OutboundEvent::Completed(_) => "settlement.completed",
            OutboundEvent::Failed(_) => "settlement.failed",
            OutboundEvent::BalanceUpdate(_) => "settlement.balance-updates",
        }
    }

    /// Trade id carried by the inner message, for log correlation.
    pub fn trade_id(&self) -> &str {
        match self {
            OutboundEvent::Completed(m) => &m.trade_id,
            OutboundEvent::Failed(m) => &m.trade_id,
            OutboundEvent::BalanceUpdate(m) => &m.trade_id,
        }
    }
}
