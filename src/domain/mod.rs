//! Domain types for the curtailment and mining-valuation pipeline.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: SettlementPeriod, FarmId
//! - Curtailment and derived mining-yield record types
//! - The closed set of supported hardware profiles
//! - Rollup row types (daily/monthly/yearly, curtailment and mining variants)

pub mod curtailment;
pub mod decimal;
pub mod hardware;
pub mod mining;
pub mod primitives;
pub mod rollup;

pub use curtailment::CurtailmentRecord;
pub use decimal::Decimal;
pub use hardware::{profile_by_id, supported_profile_ids, HardwareProfile, SUPPORTED_PROFILES};
pub use mining::MiningYieldRecord;
pub use primitives::{FarmId, InvalidPeriod, SettlementPeriod, PERIODS_PER_DAY, PERIOD_SECONDS};
pub use rollup::{
    DailyMiningSummary, DailySummary, MonthlyMiningSummary, MonthlySummary, YearlyMiningSummary,
    YearlySummary,
};
