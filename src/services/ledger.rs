//! In-memory ledger service
//!
//! Keyed by trade id, so re-recording the same trade is idempotent: the
//! newer snapshot replaces the older one under the same key.

use async_trait::async_trait;
use dashmap::DashMap;

use super::LedgerService;
use crate::error::SettlementError;
use crate::models::SettlementTransaction;

/// Process-local [`LedgerService`].
#[derive(Default)]
pub struct InMemoryLedgerService {
    records: DashMap<String, SettlementTransaction>,
}

impl InMemoryLedgerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl LedgerService for InMemoryLedgerService {
    async fn record_transaction(
        &self,
        transaction: &SettlementTransaction,
    ) -> Result<bool, SettlementError> {
        self.records
            .insert(transaction.trade_id.clone(), transaction.clone());
        Ok(true)
    }

    async fn get_transaction(
        &self,
        trade_id: &str,
    ) -> Result<Option<SettlementTransaction>, SettlementError> {
        Ok(self.records.get(trade_id).map(|r| r.clone()))
    }
}
