//! Data source abstraction for fetching bid-acceptance records from the
//! upstream balancing-mechanism API.

use crate::domain::{CurtailmentRecord, SettlementPeriod};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;

pub mod elexon;
pub mod mock;

pub use elexon::ElexonSource;
pub use mock::MockCurtailmentSource;

/// Source of per-period bid-acceptance records.
///
/// Implementations must handle retry/backoff and rate limiting; a fetch has no
/// side effects and is always safe to retry.
#[async_trait]
pub trait CurtailmentSource: Send + Sync + fmt::Debug {
    /// Fetch all acceptance records for one (settlement date, settlement
    /// period). Returns an empty vector when the upstream has no data for the
    /// period; malformed individual items are skipped with a warning, not
    /// treated as an empty period.
    async fn fetch_period(
        &self,
        date: NaiveDate,
        period: SettlementPeriod,
    ) -> Result<Vec<CurtailmentRecord>, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 5xx server error)
    HttpError { status: u16, message: String },
    /// The upstream returned a shape the parser cannot interpret
    ParseError(String),
    /// Rate limit exceeded and retries exhausted
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = DataSourceError::HttpError {
            status: 503,
            message: "Service unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 503: Service unavailable");

        let err = DataSourceError::ParseError("missing volume field".to_string());
        assert_eq!(err.to_string(), "Parse error: missing volume field");

        let err = DataSourceError::RateLimited;
        assert_eq!(err.to_string(), "Rate limited");
    }
}
