//! Rollup row types.
//!
//! Rollups are pure sums over their constituents and carry no extra state, so
//! a rebuild with unchanged underlying data reproduces them byte-identically.

use super::Decimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily curtailment rollup: sums over `curtailment_records` for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub settlement_date: NaiveDate,
    /// Sum of abs(volume) in MWh.
    pub total_volume_mwh: Decimal,
    /// Sum of signed payments in GBP.
    pub total_payment: Decimal,
    pub record_count: i64,
}

/// Monthly rollup: sums over `daily_summaries` for one (year, month).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub total_volume_mwh: Decimal,
    pub total_payment: Decimal,
    pub record_count: i64,
}

/// Yearly rollup: sums over `monthly_summaries` for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlySummary {
    pub year: i32,
    pub total_volume_mwh: Decimal,
    pub total_payment: Decimal,
    pub record_count: i64,
}

/// Per-profile daily mining rollup over `mining_potential`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMiningSummary {
    pub settlement_date: NaiveDate,
    pub profile_id: String,
    pub total_btc: Decimal,
}

/// Per-profile monthly mining rollup over daily mining rollups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMiningSummary {
    pub year: i32,
    pub month: u32,
    pub profile_id: String,
    pub total_btc: Decimal,
}

/// Per-profile yearly mining rollup over monthly mining rollups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyMiningSummary {
    pub year: i32,
    pub profile_id: String,
    pub total_btc: Decimal,
}
