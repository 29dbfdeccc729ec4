use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::orchestration::ingest::IngestionError> for AppError {
    fn from(err: crate::orchestration::ingest::IngestionError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::orchestration::orchestrator::OrchestrationError> for AppError {
    fn from(err: crate::orchestration::orchestrator::OrchestrationError) -> Self {
        use crate::orchestration::orchestrator::OrchestrationError;
        match err {
            OrchestrationError::Ingestion(e) => AppError::UpstreamUnavailable(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<crate::rollup::RollupError> for AppError {
    fn from(err: crate::rollup::RollupError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::UpstreamUnavailable(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
