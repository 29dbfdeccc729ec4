use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_range, AppState};
use crate::error::AppError;
use crate::reconcile::{DateReconciliation, MissingTuple};

#[derive(Debug, Deserialize)]
pub struct ReconciliationQuery {
    pub from: String,
    pub to: String,
    pub detail: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    pub from: chrono::NaiveDate,
    pub to: chrono::NaiveDate,
    pub dates: Vec<DateReconciliation>,
    pub total_expected: i64,
    pub total_present: i64,
    pub total_missing: i64,
    pub percent_complete: f64,
    pub unknown_dates: i64,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<MissingTuple>>,
}

pub async fn get_reconciliation(
    Query(params): Query<ReconciliationQuery>,
    State(state): State<AppState>,
) -> Result<Json<ReconciliationResponse>, AppError> {
    let (from, to) = parse_range(&params.from, &params.to)?;

    let report = state.checker.report(from, to).await?;
    let missing = if params.detail.unwrap_or(false) {
        Some(state.checker.missing_tuples(from, to).await?)
    } else {
        None
    };

    Ok(Json(ReconciliationResponse {
        from: report.from,
        to: report.to,
        complete: report.is_complete(),
        dates: report.dates,
        total_expected: report.total_expected,
        total_present: report.total_present,
        total_missing: report.total_missing,
        percent_complete: report.percent_complete,
        unknown_dates: report.unknown_dates,
        missing,
    }))
}
