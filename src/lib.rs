//! Settlement Core - saga-based trade settlement engine
//!
//! Settles matched trades across independently-owned services with no shared
//! database transaction: lock funds, transfer the asset, charge fees, record
//! the trade, announce the outcome - or undo exactly the steps that already
//! succeeded, in reverse order, when any step definitively fails.
//!
//! ```text
//! ┌──────────┐    ┌─────────────┐    ┌───────────────┐    ┌───────────┐
//! │  Trade   │───▶│  Consumer   │───▶│  Coordinator  │───▶│ Outbound  │
//! │  feed    │    │ (1 task per │    │ (saga + flag  │    │ messages  │
//! │  (JSON)  │    │   trade)    │    │   rollback)   │    │           │
//! └──────────┘    └─────────────┘    └───────┬───────┘    └───────────┘
//!                                            │
//!                              asset / wallet / fee / ledger
//! ```
//!
//! # Modules
//!
//! - [`models`] - trade match, settlement states, transaction context
//! - [`messages`] - outbound completed/failed/balance-update notifications
//! - [`state_machine`] - generic admission/entry/rollback step executor
//! - [`resilience`] - retry with backoff inside a circuit breaker
//! - [`settlement`] - the five settlement states and the saga coordinator
//! - [`services`] - collaborator interfaces plus in-memory implementations
//! - [`consumer`] - feed loop, one saga task per inbound trade
//! - [`fee`] - maker/taker fee schedule

pub mod config;
pub mod consumer;
pub mod error;
pub mod fee;
pub mod logging;
pub mod messages;
pub mod models;
pub mod resilience;
pub mod services;
pub mod settlement;
pub mod state_machine;

// Convenient re-exports at crate root
pub use config::{AppConfig, ConsumerConfig, FeeConfig, ResilienceConfig};
pub use consumer::SettlementConsumer;
pub use error::SettlementError;
pub use fee::FeeSchedule;
pub use messages::{
    BalanceUpdateMessage, OutboundEvent, SettlementCompletedMessage, SettlementFailedMessage,
};
pub use models::{MakerSide, SettlementState, SettlementTransaction, TradeMatch};
pub use resilience::{CircuitBreaker, ResiliencePolicy, RetryPolicy, StepOutcome};
pub use services::{
    AssetService, ChannelPublisher, FeeService, InMemoryAssetService, InMemoryLedgerService,
    InMemoryWalletService, LedgerService, SettlementPublisher, StandardFeeService, WalletService,
};
pub use settlement::SettlementCoordinator;
pub use state_machine::{State, StateMachine};
