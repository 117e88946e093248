//! In-memory asset service
//!
//! Two-bucket custody accounting per (user, symbol): `available` and
//! `locked`. A lock moves funds between the buckets and refuses outright
//! when available funds are short.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::warn;

use super::AssetService;
use crate::error::SettlementError;

#[derive(Debug, Clone, Copy, Default)]
struct Holding {
    available: Decimal,
    locked: Decimal,
}

/// Process-local [`AssetService`] keyed by (user, symbol).
#[derive(Default)]
pub struct InMemoryAssetService {
    holdings: DashMap<(String, String), Holding>,
}

impl InMemoryAssetService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's available balance.
    pub fn deposit(&self, user_id: &str, symbol: &str, amount: Decimal) {
        let mut holding = self
            .holdings
            .entry((user_id.to_string(), symbol.to_string()))
            .or_default();
        holding.available += amount;
    }

    /// Currently locked amount, for assertions and balance reporting.
    pub fn locked(&self, user_id: &str, symbol: &str) -> Decimal {
        self.holdings
            .get(&(user_id.to_string(), symbol.to_string()))
            .map(|h| h.locked)
            .unwrap_or(Decimal::ZERO)
    }
}

#[async_trait]
impl AssetService for InMemoryAssetService {
    async fn lock_assets(
        &self,
        user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError> {
        let mut holding = self
            .holdings
            .entry((user_id.to_string(), symbol.to_string()))
            .or_default();

        if holding.available < amount {
            warn!(
                user_id,
                symbol,
                %amount,
                available = %holding.available,
                "insufficient funds to lock"
            );
            return Ok(false);
        }

        holding.available -= amount;
        holding.locked += amount;
        Ok(true)
    }

    async fn unlock_assets(
        &self,
        user_id: &str,
        symbol: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError> {
        let mut holding = self
            .holdings
            .entry((user_id.to_string(), symbol.to_string()))
            .or_default();

        if holding.locked < amount {
            warn!(
                user_id,
                symbol,
                %amount,
                locked = %holding.locked,
                "insufficient locked funds to unlock"
            );
            return Ok(false);
        }

        holding.locked -= amount;
        holding.available += amount;
        Ok(true)
    }

    async fn get_balance(&self, user_id: &str, symbol: &str) -> Result<Decimal, SettlementError> {
        Ok(self
            .holdings
            .get(&(user_id.to_string(), symbol.to_string()))
            .map(|h| h.available)
            .unwrap_or(Decimal::ZERO))
    }
}
