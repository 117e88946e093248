//! Fee service backed by the static maker/taker schedule

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::FeeService;
use crate::error::SettlementError;
use crate::fee::FeeSchedule;
use crate::models::MakerSide;

/// [`FeeService`] applying one [`FeeSchedule`] to every symbol.
#[derive(Default)]
pub struct StandardFeeService {
    schedule: FeeSchedule,
}

impl StandardFeeService {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }
}

#[async_trait]
impl FeeService for StandardFeeService {
    async fn calculate_fees(
        &self,
        _symbol: &str,
        price: Decimal,
        quantity: Decimal,
        maker_side: MakerSide,
    ) -> Result<(Decimal, Decimal), SettlementError> {
        Ok(self.schedule.calculate(price, quantity, maker_side))
    }
}
