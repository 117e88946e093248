//! Integration tests for the settlement saga
//!
//! Mock-backed scenarios verify the compensation and resilience contracts
//! (which calls ran, how often, in what order); the in-memory services power
//! the end-to-end happy path with real balance movements. Timing assertions
//! run on tokio's paused clock, so the 2s/4s/8s backoffs cost nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::config::ResilienceConfig;
use crate::models::{MakerSide, SettlementState, SettlementTransaction, TradeMatch};
use crate::services::mock::{
    MockAssetService, MockLedgerService, MockWalletService, RecordingPublisher,
};
use crate::services::{
    AssetService, InMemoryAssetService, InMemoryLedgerService, InMemoryWalletService,
    LedgerService, StandardFeeService,
};
use crate::settlement::SettlementCoordinator;

fn sample_trade() -> TradeMatch {
    TradeMatch {
        trade_id: "T1".into(),
        buyer_id: "B".into(),
        seller_id: "S".into(),
        symbol: "BTC".into(),
        price: Decimal::from(100),
        quantity: Decimal::from(2),
        timestamp: Utc::now(),
        maker_side: MakerSide::Buy,
    }
}

fn sample_ctx() -> SettlementTransaction {
    SettlementTransaction::from_trade(&sample_trade())
}

/// Coordinator over mock collaborators, for call-level assertions.
struct MockHarness {
    coordinator: SettlementCoordinator,
    assets: Arc<MockAssetService>,
    wallet: Arc<MockWalletService>,
    ledger: Arc<MockLedgerService>,
    publisher: Arc<RecordingPublisher>,
}

impl MockHarness {
    fn new() -> Self {
        let assets = Arc::new(MockAssetService::new());
        let wallet = Arc::new(MockWalletService::new());
        let ledger = Arc::new(MockLedgerService::new());
        let publisher = Arc::new(RecordingPublisher::new());

        let coordinator = SettlementCoordinator::new(
            assets.clone(),
            wallet.clone(),
            Arc::new(StandardFeeService::default()),
            ledger.clone(),
            publisher.clone(),
            &ResilienceConfig::default(),
        );

        Self {
            coordinator,
            assets,
            wallet,
            ledger,
            publisher,
        }
    }
}

// ========================================================================
// Happy path
// ========================================================================

/// All collaborators succeed: trade T1 settles with fees 0.2 / 0.3 and the
/// balances actually move.
#[tokio::test]
async fn test_settles_trade_end_to_end() {
    let assets = Arc::new(InMemoryAssetService::new());
    let wallet = Arc::new(InMemoryWalletService::new());
    let ledger = Arc::new(InMemoryLedgerService::new());
    let publisher = Arc::new(RecordingPublisher::new());

    assets.deposit("B", "BTC", Decimal::from(500));
    assets.deposit("S", "BTC", Decimal::from(10));
    wallet.credit("S", "BTC", Decimal::new(25, 1)); // 2 to deliver + 0.3 fee
    wallet.credit("B", "BTC", Decimal::new(5, 1));

    let coordinator = SettlementCoordinator::new(
        assets.clone(),
        wallet.clone(),
        Arc::new(StandardFeeService::default()),
        ledger.clone(),
        publisher.clone(),
        &ResilienceConfig::default(),
    );

    let mut ctx = sample_ctx();
    assert!(coordinator.process(&mut ctx).await);

    assert_eq!(ctx.state, SettlementState::Completed);
    assert_eq!(ctx.buyer_fee, Decimal::new(2, 1));
    assert_eq!(ctx.seller_fee, Decimal::new(3, 1));
    assert_eq!(ctx.retry_count, 0);

    // Wallet: buyer received 2 and paid 0.2; seller delivered 2 and paid 0.3
    assert_eq!(wallet.balance_of("B", "BTC"), Decimal::new(23, 1));
    assert_eq!(wallet.balance_of("S", "BTC"), Decimal::new(2, 1));
    assert_eq!(wallet.accrued_fees("BTC"), Decimal::new(5, 1));

    // Custody holds were taken and fully released again
    assert_eq!(assets.get_balance("B", "BTC").await.unwrap(), Decimal::from(500));
    assert_eq!(assets.locked("B", "BTC"), Decimal::ZERO);
    assert_eq!(assets.locked("S", "BTC"), Decimal::ZERO);

    // Ledger holds the settlement, notifications went out
    assert!(ledger.get_transaction("T1").await.unwrap().is_some());

    let completed = publisher.completed_messages();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].buyer_fee, Decimal::new(2, 1));
    assert_eq!(completed[0].seller_fee, Decimal::new(3, 1));
    assert_eq!(completed[0].settlement_id, ctx.id);

    let updates = publisher.balance_updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].user_id, "B");
    assert_eq!(updates[0].balance, Decimal::from(500));
    assert_eq!(updates[1].user_id, "S");
    assert_eq!(updates[1].balance, Decimal::from(10));

    assert!(publisher.failed_messages().is_empty());
}

/// Notification failures never un-settle a settled trade.
#[tokio::test]
async fn test_publisher_failure_does_not_fail_settlement() {
    let harness = MockHarness::new();
    harness.publisher.set_fail(true);

    let mut ctx = sample_ctx();
    assert!(harness.coordinator.process(&mut ctx).await);
    assert_eq!(ctx.state, SettlementState::Completed);
}

// ========================================================================
// Failure & compensation
// ========================================================================

/// The wallet transfer faults on every attempt: retries exhaust, both holds
/// are released, and the failure notification carries the retry count.
#[tokio::test(start_paused = true)]
async fn test_transfer_fault_exhausts_retries_and_rolls_back() {
    let harness = MockHarness::new();
    harness.wallet.fail_transfers_forever();

    let started = Instant::now();
    let mut ctx = sample_ctx();
    assert!(!harness.coordinator.process(&mut ctx).await);

    // 2s + 4s + 8s of virtual backoff before the step gave up
    assert_eq!(started.elapsed(), Duration::from_secs(14));

    assert_eq!(ctx.state, SettlementState::Failed);
    assert_eq!(ctx.retry_count, 3);
    assert!(!ctx.is_transfer_completed);

    // Four forward attempts, no reversal: the transfer never took effect
    let transfers = harness.wallet.transfer_calls();
    assert_eq!(transfers.len(), 4);
    assert!(transfers.iter().all(|(from, to, _, _)| from == "S" && to == "B"));
    assert!(harness.wallet.refund_calls().is_empty());

    // Rollback released exactly the two holds
    assert_eq!(
        harness.assets.unlock_calls(),
        vec![
            ("B".into(), "BTC".into(), Decimal::from(200)),
            ("S".into(), "BTC".into(), Decimal::from(2)),
        ]
    );

    let failed = harness.publisher.failed_messages();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].failed_at_state, SettlementState::Locked);
    assert_eq!(failed[0].retry_count, 3);
    assert!(failed[0].error_message.contains("wallet"));

    assert_eq!(harness.ledger.record_attempts(), 0);
}

/// Seller lock refusal: the buyer hold is released inside the lock step, and
/// the saga-level rollback does not release it a second time.
#[tokio::test]
async fn test_seller_lock_refusal_releases_buyer_once() {
    let harness = MockHarness::new();
    harness.assets.set_refuse_lock_for("S");

    let mut ctx = sample_ctx();
    assert!(!harness.coordinator.process(&mut ctx).await);

    assert_eq!(ctx.state, SettlementState::Failed);
    assert_eq!(ctx.retry_count, 0);
    assert_eq!(harness.wallet.transfer_count(), 0);

    // Exactly one unlock: the local undo of the buyer hold
    assert_eq!(
        harness.assets.unlock_calls(),
        vec![("B".into(), "BTC".into(), Decimal::from(200))]
    );

    let failed = harness.publisher.failed_messages();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].failed_at_state, SettlementState::Pending);
}

/// Compensation is driven by flags: with only the lock flags set, rollback
/// performs the two unlocks and nothing else.
#[tokio::test]
async fn test_rollback_undoes_only_flagged_steps() {
    let harness = MockHarness::new();

    let mut ctx = sample_ctx();
    ctx.state = SettlementState::Locked;
    ctx.is_buyer_locked = true;
    ctx.is_seller_locked = true;

    harness.coordinator.rollback(&mut ctx).await;

    assert_eq!(ctx.state, SettlementState::Failed);
    assert_eq!(harness.assets.unlock_count(), 2);
    assert_eq!(harness.wallet.transfer_count(), 0);
    assert!(harness.wallet.refund_calls().is_empty());
    assert!(!ctx.is_buyer_locked);
    assert!(!ctx.is_seller_locked);
}

/// Flags are cleared by each undo, so a second rollback on the same context
/// performs no duplicate compensation.
#[tokio::test]
async fn test_rollback_twice_performs_no_duplicate_undos() {
    let harness = MockHarness::new();

    let mut ctx = sample_ctx();
    ctx.state = SettlementState::FeeDiscount;
    ctx.is_buyer_locked = true;
    ctx.is_seller_locked = true;
    ctx.is_transfer_completed = true;
    ctx.is_fee_processed = true;
    ctx.buyer_fee = Decimal::new(2, 1);
    ctx.seller_fee = Decimal::new(3, 1);

    harness.coordinator.rollback(&mut ctx).await;

    // Reversal moved the quantity back buyer -> seller
    let transfers = harness.wallet.transfer_calls();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].0, "B");
    assert_eq!(transfers[0].1, "S");
    assert_eq!(harness.wallet.refund_calls().len(), 2);
    assert_eq!(harness.assets.unlock_count(), 2);

    harness.coordinator.rollback(&mut ctx).await;

    assert_eq!(harness.wallet.transfer_count(), 1);
    assert_eq!(harness.wallet.refund_calls().len(), 2);
    assert_eq!(harness.assets.unlock_count(), 2);
}

// ========================================================================
// Resilience behavior
// ========================================================================

/// Two transient faults then success: the step recovers, the context
/// remembers the retries, and the trade still settles.
#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_transient_faults() {
    let harness = MockHarness::new();
    harness.wallet.set_transfer_faults(2);

    let started = Instant::now();
    let mut ctx = sample_ctx();
    assert!(harness.coordinator.process(&mut ctx).await);

    // 2s + 4s of virtual backoff
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    assert_eq!(ctx.state, SettlementState::Completed);
    assert_eq!(ctx.retry_count, 2);
    assert_eq!(harness.wallet.transfer_count(), 3);

    let completed = harness.publisher.completed_messages();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].buyer_fee, Decimal::new(2, 1));
}

/// Unusable trade data fails the Pending step immediately: no retries, no
/// collaborator calls, straight to the failure notification.
#[tokio::test]
async fn test_validation_failure_fails_fast() {
    let harness = MockHarness::new();

    let mut trade = sample_trade();
    trade.price = Decimal::ZERO;
    let mut ctx = SettlementTransaction::from_trade(&trade);

    assert!(!harness.coordinator.process(&mut ctx).await);

    assert_eq!(ctx.state, SettlementState::Failed);
    assert_eq!(ctx.retry_count, 0);
    assert!(harness.assets.lock_calls().is_empty());
    assert!(harness.wallet.transfer_calls().is_empty());

    let failed = harness.publisher.failed_messages();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].failed_at_state, SettlementState::Pending);
    assert!(failed[0].error_message.contains("positive"));
}

/// The recorded state only ever walks the forward prefix: after a mid-path
/// failure it reflects the last fully entered stage before being forced to
/// Failed, never a later one.
#[tokio::test(start_paused = true)]
async fn test_state_never_passes_the_failed_step() {
    let harness = MockHarness::new();
    harness.ledger.set_refuse_record(true);

    let mut ctx = sample_ctx();
    assert!(!harness.coordinator.process(&mut ctx).await);

    // FeeDiscount succeeded, Completed refused, rollback forced Failed
    let failed = harness.publisher.failed_messages();
    assert_eq!(failed[0].failed_at_state, SettlementState::FeeDiscount);
    assert_eq!(ctx.state, SettlementState::Failed);

    // Everything the flags recorded was undone, in reverse order
    assert_eq!(harness.wallet.transfer_count(), 2); // forward + reversal
    assert_eq!(harness.wallet.refund_calls().len(), 2);
    assert_eq!(harness.assets.unlock_count(), 2);
}
