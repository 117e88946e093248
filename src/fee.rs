//! Fee schedule
//!
//! Maker/taker differentiated rates applied to trade notional
//! (price * quantity). The maker side pays the lower rate.

use rust_decimal::Decimal;

use crate::config::FeeConfig;
use crate::models::MakerSide;

/// Default maker fee rate (0.10%)
pub fn default_maker_rate() -> Decimal {
    Decimal::new(1, 3)
}

/// Default taker fee rate (0.15%)
pub fn default_taker_rate() -> Decimal {
    Decimal::new(15, 4)
}

/// Maker/taker fee schedule.
#[derive(Debug, Clone, Copy)]
pub struct FeeSchedule {
    maker_rate: Decimal,
    taker_rate: Decimal,
}

impl FeeSchedule {
    pub fn new(maker_rate: Decimal, taker_rate: Decimal) -> Self {
        Self {
            maker_rate,
            taker_rate,
        }
    }

    pub fn from_config(config: &FeeConfig) -> Self {
        Self::new(config.maker_rate, config.taker_rate)
    }

    /// Compute `(buyer_fee, seller_fee)` for one trade.
    ///
    /// The party on the maker side pays `maker_rate * notional`, the other
    /// party pays `taker_rate * notional`.
    pub fn calculate(
        &self,
        price: Decimal,
        quantity: Decimal,
        maker_side: MakerSide,
    ) -> (Decimal, Decimal) {
        let notional = price * quantity;
        match maker_side {
            MakerSide::Buy => (self.maker_rate * notional, self.taker_rate * notional),
            MakerSide::Sell => (self.taker_rate * notional, self.maker_rate * notional),
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(default_maker_rate(), default_taker_rate())
    }
}
