//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `curtailment.rs` - curtailment record and ingestion-log operations
//! - `mining.rs` - derived mining-yield operations and reconciliation queries
//! - `rollups.rs` - daily/monthly/yearly summary operations

mod curtailment;
mod mining;
mod rollups;

use crate::domain::{Decimal, FarmId, SettlementPeriod};
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// One (date, period, farm, profile) tuple required by the reconciliation
/// invariant but absent from `mining_potential`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingYieldRow {
    pub settlement_date: NaiveDate,
    pub settlement_period: SettlementPeriod,
    pub farm_id: FarmId,
    pub profile_id: String,
}

/// Per-date derived-row coverage: how many (period, farm, profile) tuples are
/// expected versus present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCoverageRow {
    pub settlement_date: NaiveDate,
    pub expected: i64,
    pub present: i64,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// ISO date string used as the TEXT settlement_date column value. Lexicographic
/// order matches date order, so range predicates compare strings directly.
pub(crate) fn date_to_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_str(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!(date = %s, error = %e, "Failed to parse stored settlement_date, using epoch");
        NaiveDate::default()
    })
}

pub(crate) fn decimal_from_column(s: &str, context: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_else(|e| {
        warn!(value = %s, context = %context, error = %e, "Failed to parse stored decimal, using default");
        Decimal::default()
    })
}

pub(crate) fn period_from_column(value: i64) -> SettlementPeriod {
    SettlementPeriod::try_from(value).unwrap_or_else(|e| {
        warn!(period = value, error = %e, "Stored settlement_period out of range, clamping to 1");
        SettlementPeriod::new(1).expect("1 is a valid settlement period")
    })
}
