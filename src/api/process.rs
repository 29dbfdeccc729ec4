use axum::extract::{Path, State};
use axum::Json;

use crate::api::{parse_date, AppState};
use crate::error::AppError;
use crate::orchestration::ProcessOutcome;

/// Run the full pipeline for one settlement date. The outcome reports partial
/// results honestly: `complete` is false whenever any period fetch failed or
/// any derived tuple is still missing.
pub async fn process_date(
    Path(date): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProcessOutcome>, AppError> {
    let date = parse_date(&date, "date")?;
    let outcome = state.orchestrator.process_date(date).await?;
    Ok(Json(outcome))
}
