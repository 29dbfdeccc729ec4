//! Curtailment record: one accepted turn-down instruction, aggregated per
//! (settlement date, settlement period, farm).

use super::{Decimal, FarmId, SettlementPeriod};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the fine-grained curtailment table.
///
/// Sign convention: curtailment bid acceptances carry negative `volume_mwh`
/// (energy turned down) and negative prices; `payment` is the signed product
/// `volume * final_price`, positive for a typical curtailment (a cost borne by
/// the system). Rollups report `abs(volume)` and the signed payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurtailmentRecord {
    pub settlement_date: NaiveDate,
    pub settlement_period: SettlementPeriod,
    pub farm_id: FarmId,
    pub lead_party: String,
    pub volume_mwh: Decimal,
    pub original_price: Decimal,
    pub final_price: Decimal,
    pub payment: Decimal,
    pub so_flag: bool,
    pub cadl_flag: bool,
}

impl CurtailmentRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settlement_date: NaiveDate,
        settlement_period: SettlementPeriod,
        farm_id: FarmId,
        lead_party: String,
        volume_mwh: Decimal,
        original_price: Decimal,
        final_price: Decimal,
        payment: Decimal,
        so_flag: bool,
        cadl_flag: bool,
    ) -> Self {
        Self {
            settlement_date,
            settlement_period,
            farm_id,
            lead_party,
            volume_mwh,
            original_price,
            final_price,
            payment,
            so_flag,
            cadl_flag,
        }
    }

    /// Natural key of the record within the curtailment table.
    pub fn natural_key(&self) -> (NaiveDate, SettlementPeriod, FarmId) {
        (
            self.settlement_date,
            self.settlement_period,
            self.farm_id.clone(),
        )
    }

    /// True for turn-down instructions (the rows this system tracks).
    pub fn is_curtailment(&self) -> bool {
        self.volume_mwh.is_negative()
    }

    /// Curtailed energy as a non-negative magnitude.
    pub fn curtailed_mwh(&self) -> Decimal {
        self.volume_mwh.abs()
    }
}
