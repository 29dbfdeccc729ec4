//! Mock curtailment source for testing without network calls.

use super::{CurtailmentSource, DataSourceError};
use crate::domain::{CurtailmentRecord, SettlementPeriod};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Mock source that serves predefined records and can script transient
/// failures for the first N fetches.
#[derive(Debug, Clone)]
pub struct MockCurtailmentSource {
    records: Vec<CurtailmentRecord>,
    failures_remaining: Arc<AtomicU32>,
    failure: Option<DataSourceError>,
    calls: Arc<AtomicU32>,
}

impl MockCurtailmentSource {
    /// Create a new mock source with no data.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            failures_remaining: Arc::new(AtomicU32::new(0)),
            failure: None,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Add a record to the mock source.
    pub fn with_record(mut self, record: CurtailmentRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Add multiple records to the mock source.
    pub fn with_records(mut self, records: Vec<CurtailmentRecord>) -> Self {
        self.records.extend(records);
        self
    }

    /// Script the first `count` fetches to fail with `error`.
    pub fn with_failures(mut self, count: u32, error: DataSourceError) -> Self {
        self.failures_remaining = Arc::new(AtomicU32::new(count));
        self.failure = Some(error);
        self
    }

    /// Number of fetch_period calls made so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCurtailmentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CurtailmentSource for MockCurtailmentSource {
    async fn fetch_period(
        &self,
        date: NaiveDate,
        period: SettlementPeriod,
    ) -> Result<Vec<CurtailmentRecord>, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = &self.failure {
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0
                && self
                    .failures_remaining
                    .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                return Err(error.clone());
            }
        }

        Ok(self
            .records
            .iter()
            .filter(|r| r.settlement_date == date && r.settlement_period == period)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, FarmId};

    fn make_record(period: u8) -> CurtailmentRecord {
        CurtailmentRecord::new(
            NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
            SettlementPeriod::new(period).unwrap(),
            FarmId::new("T_MOWEO-1".to_string()),
            "Moray Offshore Windfarm (East) Ltd".to_string(),
            Decimal::from_str_canonical("-100").unwrap(),
            Decimal::from_str_canonical("-52").unwrap(),
            Decimal::from_str_canonical("-52").unwrap(),
            Decimal::from_str_canonical("5200").unwrap(),
            true,
            false,
        )
    }

    #[tokio::test]
    async fn test_mock_filters_by_date_and_period() {
        let source = MockCurtailmentSource::new()
            .with_record(make_record(1))
            .with_record(make_record(2));

        let date = NaiveDate::from_ymd_opt(2025, 3, 28).unwrap();
        let got = source
            .fetch_period(date, SettlementPeriod::new(1).unwrap())
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].settlement_period.as_u8(), 1);

        let other_date = NaiveDate::from_ymd_opt(2025, 3, 29).unwrap();
        let got = source
            .fetch_period(other_date, SettlementPeriod::new(1).unwrap())
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_mock_scripted_failures_then_success() {
        let source = MockCurtailmentSource::new()
            .with_record(make_record(1))
            .with_failures(1, DataSourceError::RateLimited);

        let date = NaiveDate::from_ymd_opt(2025, 3, 28).unwrap();
        let period = SettlementPeriod::new(1).unwrap();

        let first = source.fetch_period(date, period).await;
        assert!(matches!(first, Err(DataSourceError::RateLimited)));

        let second = source.fetch_period(date, period).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(source.call_count(), 2);
    }
}
