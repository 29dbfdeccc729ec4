//! Aggregate rebuilder.
//!
//! Rollups are recomputed, never incrementally patched. The summation order
//! is fixed: daily from the raw tables, monthly from daily rows only, yearly
//! from monthly rows only. Skipping a level can diverge from a corrected
//! daily figure, so it is treated as a correctness bug, not an optimization.

use crate::db::Repository;
use crate::domain::{
    CurtailmentRecord, DailyMiningSummary, DailySummary, Decimal, MiningYieldRecord,
    MonthlyMiningSummary, MonthlySummary, YearlyMiningSummary, YearlySummary,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RollupError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("invalid month {month} in year {year}")]
    InvalidMonth { year: i32, month: u32 },
}

/// A stored rollup value that does not equal the sum of its constituents.
/// Surfaced as a hard alert; neither side is ever silently overwritten.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AggregateInconsistency {
    pub level: String,
    pub key: String,
    pub field: String,
    pub stored: String,
    pub computed: String,
}

/// Stateless recomputation of the summary tables.
#[derive(Clone)]
pub struct AggregateRebuilder {
    repo: Arc<Repository>,
}

impl AggregateRebuilder {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Rebuild the daily rollups for one date from the fine-grained tables.
    /// An empty day deletes the rollup row: absence means "no data ingested",
    /// distinct from "ingested, totals to zero".
    pub async fn rebuild_day(&self, date: NaiveDate) -> Result<(), RollupError> {
        let records = self.repo.query_curtailment_date(date).await?;
        match daily_from_records(date, &records) {
            Some(summary) => self.repo.upsert_daily_summary(&summary).await?,
            None => {
                self.repo.delete_daily_summary(date).await?;
            }
        }

        let yields = self.repo.query_mining_date(date).await?;
        self.repo.delete_daily_mining_summaries(date).await?;
        for summary in mining_daily_from_records(date, &yields) {
            self.repo.upsert_daily_mining_summary(&summary).await?;
        }

        debug!("Rebuilt daily rollups for {}", date);
        Ok(())
    }

    /// Rebuild one month's rollups from the daily rollup rows only.
    pub async fn rebuild_month(&self, year: i32, month: u32) -> Result<(), RollupError> {
        let (first, last) = month_bounds(year, month)?;

        let dailies = self.repo.query_daily_summaries(first, last).await?;
        if dailies.is_empty() {
            self.repo.delete_monthly_summary(year, month).await?;
        } else {
            let summary = MonthlySummary {
                year,
                month,
                total_volume_mwh: dailies.iter().map(|d| d.total_volume_mwh).sum(),
                total_payment: dailies.iter().map(|d| d.total_payment).sum(),
                record_count: dailies.iter().map(|d| d.record_count).sum(),
            };
            self.repo.upsert_monthly_summary(&summary).await?;
        }

        let mining_dailies = self.repo.query_daily_mining_summaries(first, last).await?;
        self.repo
            .delete_monthly_mining_summaries(year, month)
            .await?;
        for (profile_id, total_btc) in
            sum_by_profile(mining_dailies.iter().map(|d| (&d.profile_id, d.total_btc)))
        {
            self.repo
                .upsert_monthly_mining_summary(&MonthlyMiningSummary {
                    year,
                    month,
                    profile_id,
                    total_btc,
                })
                .await?;
        }

        debug!("Rebuilt monthly rollups for {}-{:02}", year, month);
        Ok(())
    }

    /// Rebuild one year's rollups from the monthly rollup rows only.
    pub async fn rebuild_year(&self, year: i32) -> Result<(), RollupError> {
        let monthlies = self.repo.query_monthly_summaries(year).await?;
        if monthlies.is_empty() {
            self.repo.delete_yearly_summary(year).await?;
        } else {
            let summary = YearlySummary {
                year,
                total_volume_mwh: monthlies.iter().map(|m| m.total_volume_mwh).sum(),
                total_payment: monthlies.iter().map(|m| m.total_payment).sum(),
                record_count: monthlies.iter().map(|m| m.record_count).sum(),
            };
            self.repo.upsert_yearly_summary(&summary).await?;
        }

        let mining_monthlies = self.repo.query_monthly_mining_summaries(year).await?;
        self.repo.delete_yearly_mining_summaries(year).await?;
        for (profile_id, total_btc) in
            sum_by_profile(mining_monthlies.iter().map(|m| (&m.profile_id, m.total_btc)))
        {
            self.repo
                .upsert_yearly_mining_summary(&YearlyMiningSummary {
                    year,
                    profile_id,
                    total_btc,
                })
                .await?;
        }

        debug!("Rebuilt yearly rollups for {}", year);
        Ok(())
    }

    /// Rebuild all three levels touched by a change to one date, in order.
    pub async fn rebuild_for_date(&self, date: NaiveDate) -> Result<(), RollupError> {
        self.rebuild_day(date).await?;
        self.rebuild_month(date.year(), date.month()).await?;
        self.rebuild_year(date.year()).await?;
        Ok(())
    }

    /// Compare stored rollups against recomputed sums for one date's day,
    /// month, and year. Returns every mismatch found.
    pub async fn verify_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AggregateInconsistency>, RollupError> {
        let mut inconsistencies = Vec::new();

        // Daily vs raw records.
        let records = self.repo.query_curtailment_date(date).await?;
        let computed = daily_from_records(date, &records);
        let stored = self.repo.get_daily_summary(date).await?;
        compare_summary(
            &mut inconsistencies,
            "daily",
            &date.to_string(),
            stored.as_ref().map(|s| (s.total_volume_mwh, s.total_payment)),
            computed.as_ref().map(|s| (s.total_volume_mwh, s.total_payment)),
        );

        // Monthly vs daily rows.
        let (year, month) = (date.year(), date.month());
        let (first, last) = month_bounds(year, month)?;
        let dailies = self.repo.query_daily_summaries(first, last).await?;
        let computed_month = if dailies.is_empty() {
            None
        } else {
            Some((
                dailies.iter().map(|d| d.total_volume_mwh).sum(),
                dailies.iter().map(|d| d.total_payment).sum(),
            ))
        };
        let stored_month = self.repo.get_monthly_summary(year, month).await?;
        compare_summary(
            &mut inconsistencies,
            "monthly",
            &format!("{}-{:02}", year, month),
            stored_month
                .as_ref()
                .map(|s| (s.total_volume_mwh, s.total_payment)),
            computed_month,
        );

        // Yearly vs monthly rows.
        let monthlies = self.repo.query_monthly_summaries(year).await?;
        let computed_year = if monthlies.is_empty() {
            None
        } else {
            Some((
                monthlies.iter().map(|m| m.total_volume_mwh).sum(),
                monthlies.iter().map(|m| m.total_payment).sum(),
            ))
        };
        let stored_year = self.repo.get_yearly_summary(year).await?;
        compare_summary(
            &mut inconsistencies,
            "yearly",
            &year.to_string(),
            stored_year
                .as_ref()
                .map(|s| (s.total_volume_mwh, s.total_payment)),
            computed_year,
        );

        Ok(inconsistencies)
    }
}

/// Daily summary over the records of one date; `None` when there are none.
fn daily_from_records(date: NaiveDate, records: &[CurtailmentRecord]) -> Option<DailySummary> {
    if records.is_empty() {
        return None;
    }
    Some(DailySummary {
        settlement_date: date,
        total_volume_mwh: records.iter().map(|r| r.curtailed_mwh()).sum(),
        total_payment: records.iter().map(|r| r.payment).sum(),
        record_count: records.len() as i64,
    })
}

/// Per-profile daily mining summaries over the yield rows of one date.
fn mining_daily_from_records(
    date: NaiveDate,
    records: &[MiningYieldRecord],
) -> Vec<DailyMiningSummary> {
    sum_by_profile(records.iter().map(|r| (&r.profile_id, r.estimated_btc)))
        .into_iter()
        .map(|(profile_id, total_btc)| DailyMiningSummary {
            settlement_date: date,
            profile_id,
            total_btc,
        })
        .collect()
}

/// Sum values grouped by profile id, in deterministic (sorted) profile order.
fn sum_by_profile<'a>(
    items: impl Iterator<Item = (&'a String, Decimal)>,
) -> Vec<(String, Decimal)> {
    let mut totals: BTreeMap<&'a String, Decimal> = BTreeMap::new();
    for (profile, value) in items {
        *totals.entry(profile).or_insert_with(Decimal::zero) += value;
    }
    totals
        .into_iter()
        .map(|(profile, total)| (profile.clone(), total))
        .collect()
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), RollupError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(RollupError::InvalidMonth { year, month })?;
    let last = first
        .checked_add_months(chrono::Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or(RollupError::InvalidMonth { year, month })?;
    Ok((first, last))
}

fn compare_summary(
    out: &mut Vec<AggregateInconsistency>,
    level: &str,
    key: &str,
    stored: Option<(Decimal, Decimal)>,
    computed: Option<(Decimal, Decimal)>,
) {
    let fields = [("total_volume_mwh", 0usize), ("total_payment", 1usize)];
    match (stored, computed) {
        (None, None) => {}
        (Some(s), Some(c)) => {
            let stored_vals = [s.0, s.1];
            let computed_vals = [c.0, c.1];
            for (field, i) in fields {
                if stored_vals[i] != computed_vals[i] {
                    out.push(AggregateInconsistency {
                        level: level.to_string(),
                        key: key.to_string(),
                        field: field.to_string(),
                        stored: stored_vals[i].to_canonical_string(),
                        computed: computed_vals[i].to_canonical_string(),
                    });
                }
            }
        }
        (Some(s), None) => out.push(AggregateInconsistency {
            level: level.to_string(),
            key: key.to_string(),
            field: "row".to_string(),
            stored: format!("volume={}, payment={}", s.0, s.1),
            computed: "absent".to_string(),
        }),
        (None, Some(c)) => out.push(AggregateInconsistency {
            level: level.to_string(),
            key: key.to_string(),
            field: "row".to_string(),
            stored: "absent".to_string(),
            computed: format!("volume={}, payment={}", c.0, c.1),
        }),
    }
}
