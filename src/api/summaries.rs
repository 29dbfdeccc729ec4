use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_range, AppState};
use crate::domain::{
    DailyMiningSummary, DailySummary, MonthlyMiningSummary, MonthlySummary, YearlyMiningSummary,
    YearlySummary,
};
use crate::error::AppError;
use crate::rollup::AggregateInconsistency;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: i32,
}

#[derive(Debug, Serialize)]
pub struct DailySummaryRow {
    pub settlement_date: chrono::NaiveDate,
    pub total_volume_mwh: String,
    pub total_payment: String,
    pub record_count: i64,
}

impl From<DailySummary> for DailySummaryRow {
    fn from(s: DailySummary) -> Self {
        DailySummaryRow {
            settlement_date: s.settlement_date,
            total_volume_mwh: s.total_volume_mwh.to_canonical_string(),
            total_payment: s.total_payment.to_canonical_string(),
            record_count: s.record_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MonthlySummaryRow {
    pub year: i32,
    pub month: u32,
    pub total_volume_mwh: String,
    pub total_payment: String,
    pub record_count: i64,
}

impl From<MonthlySummary> for MonthlySummaryRow {
    fn from(s: MonthlySummary) -> Self {
        MonthlySummaryRow {
            year: s.year,
            month: s.month,
            total_volume_mwh: s.total_volume_mwh.to_canonical_string(),
            total_payment: s.total_payment.to_canonical_string(),
            record_count: s.record_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct YearlySummaryRow {
    pub year: i32,
    pub total_volume_mwh: String,
    pub total_payment: String,
    pub record_count: i64,
}

impl From<YearlySummary> for YearlySummaryRow {
    fn from(s: YearlySummary) -> Self {
        YearlySummaryRow {
            year: s.year,
            total_volume_mwh: s.total_volume_mwh.to_canonical_string(),
            total_payment: s.total_payment.to_canonical_string(),
            record_count: s.record_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MiningSummaryRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_date: Option<chrono::NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    pub profile_id: String,
    pub total_btc: String,
}

impl From<DailyMiningSummary> for MiningSummaryRow {
    fn from(s: DailyMiningSummary) -> Self {
        MiningSummaryRow {
            settlement_date: Some(s.settlement_date),
            year: None,
            month: None,
            profile_id: s.profile_id,
            total_btc: s.total_btc.to_canonical_string(),
        }
    }
}

impl From<MonthlyMiningSummary> for MiningSummaryRow {
    fn from(s: MonthlyMiningSummary) -> Self {
        MiningSummaryRow {
            settlement_date: None,
            year: Some(s.year),
            month: Some(s.month),
            profile_id: s.profile_id,
            total_btc: s.total_btc.to_canonical_string(),
        }
    }
}

impl From<YearlyMiningSummary> for MiningSummaryRow {
    fn from(s: YearlyMiningSummary) -> Self {
        MiningSummaryRow {
            settlement_date: None,
            year: Some(s.year),
            month: None,
            profile_id: s.profile_id,
            total_btc: s.total_btc.to_canonical_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DailyResponse {
    pub summaries: Vec<DailySummaryRow>,
    pub mining: Vec<MiningSummaryRow>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyResponse {
    pub summaries: Vec<MonthlySummaryRow>,
    pub mining: Vec<MiningSummaryRow>,
}

#[derive(Debug, Serialize)]
pub struct YearlyResponse {
    pub summaries: Vec<YearlySummaryRow>,
    pub mining: Vec<MiningSummaryRow>,
}

pub async fn get_daily(
    Query(params): Query<RangeQuery>,
    State(state): State<AppState>,
) -> Result<Json<DailyResponse>, AppError> {
    let (from, to) = parse_range(&params.from, &params.to)?;

    let summaries = state.repo.query_daily_summaries(from, to).await?;
    let mining = state.repo.query_daily_mining_summaries(from, to).await?;

    Ok(Json(DailyResponse {
        summaries: summaries.into_iter().map(Into::into).collect(),
        mining: mining.into_iter().map(Into::into).collect(),
    }))
}

pub async fn get_monthly(
    Query(params): Query<YearQuery>,
    State(state): State<AppState>,
) -> Result<Json<MonthlyResponse>, AppError> {
    let summaries = state.repo.query_monthly_summaries(params.year).await?;
    let mining = state
        .repo
        .query_monthly_mining_summaries(params.year)
        .await?;

    Ok(Json(MonthlyResponse {
        summaries: summaries.into_iter().map(Into::into).collect(),
        mining: mining.into_iter().map(Into::into).collect(),
    }))
}

pub async fn get_yearly(
    State(state): State<AppState>,
) -> Result<Json<YearlyResponse>, AppError> {
    let summaries = state.repo.query_yearly_summaries().await?;

    let mut mining = Vec::new();
    for summary in &summaries {
        mining.extend(
            state
                .repo
                .query_yearly_mining_summaries(summary.year)
                .await?
                .into_iter()
                .map(MiningSummaryRow::from),
        );
    }

    Ok(Json(YearlyResponse {
        summaries: summaries.into_iter().map(Into::into).collect(),
        mining,
    }))
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub from: chrono::NaiveDate,
    pub to: chrono::NaiveDate,
    pub dates_checked: i64,
    pub inconsistencies: Vec<AggregateInconsistency>,
    pub consistent: bool,
}

/// Recompute the three rollup levels for every date in the range and report
/// any stored value that disagrees. Nothing is corrected here.
pub async fn get_verify(
    Query(params): Query<RangeQuery>,
    State(state): State<AppState>,
) -> Result<Json<VerifyResponse>, AppError> {
    let (from, to) = parse_range(&params.from, &params.to)?;

    let mut inconsistencies = Vec::new();
    let mut dates_checked = 0i64;
    let mut date = from;
    while date <= to {
        inconsistencies.extend(state.rebuilder.verify_date(date).await?);
        dates_checked += 1;
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    inconsistencies.sort();
    inconsistencies.dedup();

    Ok(Json(VerifyResponse {
        from,
        to,
        dates_checked,
        consistent: inconsistencies.is_empty(),
        inconsistencies,
    }))
}
