//! Reconciliation checker.
//!
//! Verifies the core invariant: for every curtailment record and every
//! supported hardware profile, exactly one derived yield row exists. The
//! missing set is computed as a single set-difference query over the range.

use crate::db::repo::MissingYieldRow;
use crate::db::Repository;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Reconciliation state of one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    /// Every expected derived row is present (vacuously true for an ingested
    /// date with no curtailment).
    Complete,
    /// Some but not all expected derived rows are present.
    Partial,
    /// Ingested, but no derived rows at all.
    Missing,
    /// Never ingested; nothing can be said about derived coverage.
    Unknown,
}

/// Per-date reconciliation figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateReconciliation {
    pub settlement_date: NaiveDate,
    pub status: ReconciliationStatus,
    pub expected: i64,
    pub present: i64,
    pub missing: i64,
    pub percent_complete: f64,
}

/// Range-level reconciliation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub dates: Vec<DateReconciliation>,
    pub total_expected: i64,
    pub total_present: i64,
    pub total_missing: i64,
    pub percent_complete: f64,
    pub unknown_dates: i64,
}

impl ReconciliationReport {
    /// True only when the missing set over the whole range is empty. A report
    /// with any missing tuple must never be presented as success.
    pub fn is_complete(&self) -> bool {
        self.total_missing == 0
    }
}

/// One missing (date, period, farm, profile) tuple, as reported to drivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingTuple {
    pub settlement_date: NaiveDate,
    pub settlement_period: u8,
    pub farm_id: String,
    pub profile_id: String,
}

impl From<MissingYieldRow> for MissingTuple {
    fn from(row: MissingYieldRow) -> Self {
        MissingTuple {
            settlement_date: row.settlement_date,
            settlement_period: row.settlement_period.as_u8(),
            farm_id: row.farm_id.0,
            profile_id: row.profile_id,
        }
    }
}

/// Repo-backed checker, parameterized by the supported profile ids so it has
/// no hidden dependency on load order.
#[derive(Clone)]
pub struct ReconciliationChecker {
    repo: Arc<Repository>,
    profile_ids: Vec<String>,
}

impl ReconciliationChecker {
    pub fn new(repo: Arc<Repository>, profile_ids: Vec<String>) -> Self {
        Self { repo, profile_ids }
    }

    fn profile_refs(&self) -> Vec<&str> {
        self.profile_ids.iter().map(|s| s.as_str()).collect()
    }

    /// The missing-tuple set for an inclusive date range.
    pub async fn missing_tuples(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MissingTuple>, sqlx::Error> {
        let rows = self
            .repo
            .missing_yield_tuples(from, to, &self.profile_refs())
            .await?;
        Ok(rows.into_iter().map(MissingTuple::from).collect())
    }

    /// Per-date and range-level reconciliation report.
    ///
    /// Dates with curtailment data are classified from the coverage counts;
    /// ingested dates with no curtailment are vacuously complete; dates with
    /// no ingestion history are Unknown, never Missing.
    pub async fn report(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ReconciliationReport, sqlx::Error> {
        let coverage = self
            .repo
            .date_coverage(from, to, &self.profile_refs())
            .await?;
        let coverage_by_date: HashMap<NaiveDate, (i64, i64)> = coverage
            .into_iter()
            .map(|c| (c.settlement_date, (c.expected, c.present)))
            .collect();

        let ingested: std::collections::HashSet<NaiveDate> =
            self.repo.ingested_dates(from, to).await?.into_iter().collect();

        let mut dates = Vec::new();
        let mut total_expected = 0i64;
        let mut total_present = 0i64;
        let mut unknown_dates = 0i64;

        let mut date = from;
        while date <= to {
            let entry = match coverage_by_date.get(&date) {
                Some(&(expected, present)) => {
                    total_expected += expected;
                    total_present += present;
                    let status = if present == expected {
                        ReconciliationStatus::Complete
                    } else if present == 0 {
                        ReconciliationStatus::Missing
                    } else {
                        ReconciliationStatus::Partial
                    };
                    DateReconciliation {
                        settlement_date: date,
                        status,
                        expected,
                        present,
                        missing: expected - present,
                        percent_complete: percent(present, expected),
                    }
                }
                None if ingested.contains(&date) => DateReconciliation {
                    settlement_date: date,
                    status: ReconciliationStatus::Complete,
                    expected: 0,
                    present: 0,
                    missing: 0,
                    percent_complete: 100.0,
                },
                None => {
                    unknown_dates += 1;
                    DateReconciliation {
                        settlement_date: date,
                        status: ReconciliationStatus::Unknown,
                        expected: 0,
                        present: 0,
                        missing: 0,
                        percent_complete: 0.0,
                    }
                }
            };
            dates.push(entry);

            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        Ok(ReconciliationReport {
            from,
            to,
            dates,
            total_expected,
            total_present,
            total_missing: total_expected - total_present,
            percent_complete: percent(total_present, total_expected),
            unknown_dates,
        })
    }
}

fn percent(present: i64, expected: i64) -> f64 {
    if expected == 0 {
        100.0
    } else {
        (present as f64 / expected as f64) * 100.0
    }
}
