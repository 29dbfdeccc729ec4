//! Derived mining-yield record: one row per (date, period, farm, profile).

use super::{Decimal, FarmId, SettlementPeriod};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Hypothetical mining yield for one curtailment record under one hardware
/// profile. Regenerated wholesale per date, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningYieldRecord {
    pub settlement_date: NaiveDate,
    pub settlement_period: SettlementPeriod,
    pub farm_id: FarmId,
    pub profile_id: String,
    /// Estimated BTC at satoshi precision (8 dp).
    pub estimated_btc: Decimal,
    /// Implied number of hardware units the curtailed energy could power.
    pub hardware_units: f64,
    /// Network difficulty used for the estimate.
    pub difficulty: f64,
    /// When the row was computed, Unix millis.
    pub computed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_satoshi_precision() {
        let rec = MiningYieldRecord {
            settlement_date: NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
            settlement_period: SettlementPeriod::new(1).unwrap(),
            farm_id: FarmId::new("T_MOWEO-1".to_string()),
            profile_id: "s19j_pro".to_string(),
            estimated_btc: Decimal::from_f64_btc(0.00123456).unwrap(),
            hardware_units: 65573.77,
            difficulty: 1.1e14,
            computed_at: 1_743_120_000_000,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["profile_id"], "s19j_pro");
        assert_eq!(json["settlement_period"], 1);
    }
}
