pub mod health;
pub mod process;
pub mod reconciliation;
pub mod summaries;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::Orchestrator;
use crate::reconcile::ReconciliationChecker;
use crate::rollup::AggregateRebuilder;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub checker: ReconciliationChecker,
    pub rebuilder: AggregateRebuilder,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        orchestrator: Arc<Orchestrator>,
        checker: ReconciliationChecker,
        rebuilder: AggregateRebuilder,
    ) -> Self {
        Self {
            repo,
            config,
            orchestrator,
            checker,
            rebuilder,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/reconciliation",
            get(reconciliation::get_reconciliation),
        )
        .route("/v1/summaries/daily", get(summaries::get_daily))
        .route("/v1/summaries/monthly", get(summaries::get_monthly))
        .route("/v1/summaries/yearly", get(summaries::get_yearly))
        .route("/v1/summaries/verify", get(summaries::get_verify))
        .route("/v1/process/:date", post(process::process_date))
        .layer(cors)
        .with_state(state)
}

/// Parse a `YYYY-MM-DD` query or path parameter.
pub(crate) fn parse_date(input: &str, param: &str) -> Result<chrono::NaiveDate, crate::error::AppError> {
    chrono::NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        crate::error::AppError::BadRequest(format!("Invalid {param}: expected YYYY-MM-DD"))
    })
}

/// Parse and order-check an inclusive from/to date range.
pub(crate) fn parse_range(
    from: &str,
    to: &str,
) -> Result<(chrono::NaiveDate, chrono::NaiveDate), crate::error::AppError> {
    let from = parse_date(from, "from")?;
    let to = parse_date(to, "to")?;
    if from > to {
        return Err(crate::error::AppError::BadRequest(
            "from must be <= to".to_string(),
        ));
    }
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("2025-03-28", "from").is_ok());
        assert!(parse_date("28/03/2025", "from").is_err());
        assert!(parse_date("", "from").is_err());
    }

    #[test]
    fn test_parse_range_rejects_inverted() {
        assert!(parse_range("2025-03-01", "2025-03-28").is_ok());
        assert!(parse_range("2025-03-28", "2025-03-01").is_err());
    }
}
