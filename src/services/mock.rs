//! Mock collaborators for failure-injection tests
//!
//! Each mock records its calls for verification and exposes switches that
//! make specific operations refuse (`Ok(false)`) or fault (`Err`) on demand.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{AssetService, LedgerService, SettlementPublisher, WalletService};
use crate::error::SettlementError;
use crate::messages::{
    BalanceUpdateMessage, OutboundEvent, SettlementCompletedMessage, SettlementFailedMessage,
};
use crate::models::SettlementTransaction;

// ========================================================================
// Asset service mock
// ========================================================================

pub struct MockAssetService {
    lock_calls: Mutex<Vec<(String, String, Decimal)>>,
    unlock_calls: Mutex<Vec<(String, String, Decimal)>>,
    refuse_lock_for: Mutex<Option<String>>,
    balance: Mutex<Decimal>,
}

impl MockAssetService {
    pub fn new() -> Self {
        Self {
            lock_calls: Mutex::new(Vec::new()),
            unlock_calls: Mutex::new(Vec::new()),
            refuse_lock_for: Mutex::new(None),
            balance: Mutex::new(Decimal::from(1000)),
        }
    }

    /// Make `lock_assets` refuse for one specific user.
    pub fn set_refuse_lock_for(&self, user_id: &str) {
        *self.refuse_lock_for.lock().unwrap() = Some(user_id.to_string());
    }

    pub fn lock_calls(&self) -> Vec<(String, String, Decimal)> {
        self.lock_calls.lock().unwrap().clone()
    }

    pub fn unlock_calls(&self) -> Vec<(String, String, Decimal)> {
        self.unlock_calls.lock().unwrap().clone()
    }

    pub fn unlock_count(&self) -> usize {
        self.unlock_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AssetService for MockAssetService {
    async fn lock_assets(
        &self,
        user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError> {
        self.lock_calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), symbol.to_string(), amount));

        if self.refuse_lock_for.lock().unwrap().as_deref() == Some(user_id) {
            return Ok(false);
        }
        Ok(true)
    }

    async fn unlock_assets(
        &self,
        user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError> {
        self.unlock_calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), symbol.to_string(), amount));
        Ok(true)
    }

    async fn get_balance(&self, _user_id: &str, _symbol: &str) -> Result<Decimal, SettlementError> {
        Ok(*self.balance.lock().unwrap())
    }
}

// ========================================================================
// Wallet service mock
// ========================================================================

pub struct MockWalletService {
    transfer_calls: Mutex<Vec<(String, String, String, Decimal)>>,
    deduct_calls: Mutex<Vec<(String, String, Decimal)>>,
    refund_calls: Mutex<Vec<(String, String, Decimal)>>,
    transfer_faults_remaining: Mutex<u32>,
    refuse_fee_for: Mutex<Option<String>>,
}

impl MockWalletService {
    pub fn new() -> Self {
        Self {
            transfer_calls: Mutex::new(Vec::new()),
            deduct_calls: Mutex::new(Vec::new()),
            refund_calls: Mutex::new(Vec::new()),
            transfer_faults_remaining: Mutex::new(0),
            refuse_fee_for: Mutex::new(None),
        }
    }

    /// Make the next `n` transfer calls fault transiently.
    pub fn set_transfer_faults(&self, n: u32) {
        *self.transfer_faults_remaining.lock().unwrap() = n;
    }

    /// Make every transfer call fault transiently.
    pub fn fail_transfers_forever(&self) {
        *self.transfer_faults_remaining.lock().unwrap() = u32::MAX;
    }

    /// Make `deduct_fee` refuse for one specific user.
    pub fn set_refuse_fee_for(&self, user_id: &str) {
        *self.refuse_fee_for.lock().unwrap() = Some(user_id.to_string());
    }

    pub fn transfer_calls(&self) -> Vec<(String, String, String, Decimal)> {
        self.transfer_calls.lock().unwrap().clone()
    }

    pub fn transfer_count(&self) -> usize {
        self.transfer_calls.lock().unwrap().len()
    }

    pub fn deduct_calls(&self) -> Vec<(String, String, Decimal)> {
        self.deduct_calls.lock().unwrap().clone()
    }

    pub fn refund_calls(&self) -> Vec<(String, String, Decimal)> {
        self.refund_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletService for MockWalletService {
    async fn transfer(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError> {
        self.transfer_calls.lock().unwrap().push((
            from_user_id.to_string(),
            to_user_id.to_string(),
            symbol.to_string(),
            amount,
        ));

        let mut remaining = self.transfer_faults_remaining.lock().unwrap();
        if *remaining > 0 {
            if *remaining != u32::MAX {
                *remaining -= 1;
            }
            return Err(SettlementError::service("wallet", "transfer unavailable"));
        }
        Ok(true)
    }

    async fn deduct_fee(
        &self,
        user_id: &str,
        symbol: &str,
        fee: Decimal,
    ) -> Result<bool, SettlementError> {
        self.deduct_calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), symbol.to_string(), fee));

        if self.refuse_fee_for.lock().unwrap().as_deref() == Some(user_id) {
            return Ok(false);
        }
        Ok(true)
    }

    async fn refund_fee(
        &self,
        user_id: &str,
        symbol: &str,
        fee: Decimal,
    ) -> Result<bool, SettlementError> {
        self.refund_calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), symbol.to_string(), fee));
        Ok(true)
    }
}

// ========================================================================
// Ledger service mock
// ========================================================================

pub struct MockLedgerService {
    records: Mutex<HashMap<String, SettlementTransaction>>,
    refuse_record: AtomicBool,
    record_attempts: AtomicUsize,
}

impl MockLedgerService {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            refuse_record: AtomicBool::new(false),
            record_attempts: AtomicUsize::new(0),
        }
    }

    pub fn set_refuse_record(&self, refuse: bool) {
        self.refuse_record.store(refuse, Ordering::SeqCst);
    }

    /// Pre-seed a record, e.g. to simulate a redelivered trade.
    pub fn insert_existing(&self, transaction: SettlementTransaction) {
        self.records
            .lock()
            .unwrap()
            .insert(transaction.trade_id.clone(), transaction);
    }

    pub fn record_attempts(&self) -> usize {
        self.record_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerService for MockLedgerService {
    async fn record_transaction(
        &self,
        transaction: &SettlementTransaction,
    ) -> Result<bool, SettlementError> {
        self.record_attempts.fetch_add(1, Ordering::SeqCst);

        if self.refuse_record.load(Ordering::SeqCst) {
            return Ok(false);
        }

        self.records
            .lock()
            .unwrap()
            .insert(transaction.trade_id.clone(), transaction.clone());
        Ok(true)
    }

    async fn get_transaction(
        &self,
        trade_id: &str,
    ) -> Result<Option<SettlementTransaction>, SettlementError> {
        Ok(self.records.lock().unwrap().get(trade_id).cloned())
    }
}

// ========================================================================
// Publisher mock
// ========================================================================

pub struct RecordingPublisher {
    events: Mutex<Vec<OutboundEvent>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn completed_messages(&self) -> Vec<SettlementCompletedMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutboundEvent::Completed(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn failed_messages(&self) -> Vec<SettlementFailedMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutboundEvent::Failed(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn balance_updates(&self) -> Vec<BalanceUpdateMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutboundEvent::BalanceUpdate(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: OutboundEvent) -> Result<(), SettlementError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SettlementError::service("publisher", "sink unavailable"));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl SettlementPublisher for RecordingPublisher {
    async fn publish_completed(
        &self,
        message: &SettlementCompletedMessage,
    ) -> Result<(), SettlementError> {
        self.record(OutboundEvent::Completed(message.clone()))
    }

    async fn publish_balance_update(
        &self,
        message: &BalanceUpdateMessage,
    ) -> Result<(), SettlementError> {
        self.record(OutboundEvent::BalanceUpdate(message.clone()))
    }

    async fn publish_failed(
        &self,
        message: &SettlementFailedMessage,
    ) -> Result<(), SettlementError> {
        self.record(OutboundEvent::Failed(message.clone()))
    }
}
