//! In-memory wallet service
//!
//! Tracks spendable balances per (user, symbol) plus a per-symbol fee
//! accrual account. Transfers and fee deductions refuse when the payer is
//! short; refunds always succeed.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::warn;

use super::WalletService;
use crate::error::SettlementError;

/// Process-local [`WalletService`].
#[derive(Default)]
pub struct InMemoryWalletService {
    balances: DashMap<(String, String), Decimal>,
    fee_accrual: DashMap<String, Decimal>,
}

impl InMemoryWalletService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's balance.
    pub fn credit(&self, user_id: &str, symbol: &str, amount: Decimal) {
        *self
            .balances
            .entry((user_id.to_string(), symbol.to_string()))
            .or_default() += amount;
    }

    pub fn balance_of(&self, user_id: &str, symbol: &str) -> Decimal {
        self.balances
            .get(&(user_id.to_string(), symbol.to_string()))
            .map(|b| *b)
            .unwrap_or(Decimal::ZERO)
    }

    /// Accumulated fees for one symbol.
    pub fn accrued_fees(&self, symbol: &str) -> Decimal {
        self.fee_accrual
            .get(symbol)
            .map(|f| *f)
            .unwrap_or(Decimal::ZERO)
    }

    fn debit(&self, user_id: &str, symbol: &str, amount: Decimal) -> bool {
        let mut balance = self
            .balances
            .entry((user_id.to_string(), symbol.to_string()))
            .or_default();

        if *balance < amount {
            warn!(user_id, symbol, %amount, balance = %*balance, "insufficient wallet balance");
            return false;
        }
        *balance -= amount;
        true
    }
}

#[async_trait]
impl WalletService for InMemoryWalletService {
    async fn transfer(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError> {
        if !self.debit(from_user_id, symbol, amount) {
            return Ok(false);
        }
        self.credit(to_user_id, symbol, amount);
        Ok(true)
    }

    async fn deduct_fee(
        &self,
        user_id: &str,
        symbol: &str,
        fee: Decimal,
    ) -> Result<bool, SettlementError> {
        if !self.debit(user_id, symbol, fee) {
            return Ok(false);
        }
        *self.fee_accrual.entry(symbol.to_string()).or_default() += fee;
        Ok(true)
    }

    async fn refund_fee(
        &self,
        user_id: &str,
        symbol: &str,
        fee: Decimal,
    ) -> Result<bool, SettlementError> {
        self.credit(user_id, symbol, fee);
        *self.fee_accrual.entry(symbol.to_string()).or_default() -= fee;
        Ok(true)
    }
}
