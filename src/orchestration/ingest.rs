//! Per-date ingestion: fetch all 48 settlement periods with bounded
//! concurrency, isolate per-period failures, dedup, and upsert.

use crate::datasource::{CurtailmentSource, DataSourceError};
use crate::db::Repository;
use crate::domain::{SettlementPeriod, PERIODS_PER_DAY};
use crate::reconcile::dedup_records;
use chrono::NaiveDate;
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Ingestor {
    source: Arc<dyn CurtailmentSource>,
    repo: Arc<Repository>,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(source: Arc<dyn CurtailmentSource>, repo: Arc<Repository>, concurrency: usize) -> Self {
        Self {
            source,
            repo,
            concurrency: concurrency.max(1),
        }
    }

    /// Ingest one settlement date.
    ///
    /// Periods are independent partitions, so fetches run concurrently up to
    /// the configured limit. A failing period is counted and skipped; the
    /// other periods proceed. Only when every period fails is the date-level
    /// ingestion an error. All writes land in one transactional upsert batch,
    /// so a rerun after a mid-batch failure cannot duplicate rows.
    pub async fn ingest_date(&self, date: NaiveDate) -> Result<IngestionResult, IngestionError> {
        let results: Vec<(SettlementPeriod, Result<_, DataSourceError>)> =
            futures::stream::iter(SettlementPeriod::all().map(|period| {
                let source = self.source.clone();
                async move { (period, source.fetch_period(date, period).await) }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut records = Vec::new();
        let mut records_fetched = 0usize;
        let mut periods_ok = 0u32;
        let mut periods_failed = 0u32;
        let mut last_error: Option<DataSourceError> = None;

        for (period, result) in results {
            match result {
                Ok(batch) => {
                    periods_ok += 1;
                    records_fetched += batch.len();
                    records.extend(batch.into_iter().filter(|r| r.is_curtailment()));
                }
                Err(e) => {
                    warn!("Fetch failed for {} period {}: {}", date, period, e);
                    periods_failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if periods_ok == 0 {
            return Err(IngestionError::AllPeriodsFailed {
                date,
                last_error: last_error
                    .unwrap_or_else(|| DataSourceError::Other("no periods attempted".to_string())),
            });
        }

        let deduped = dedup_records(records);
        let records_ingested = self.repo.upsert_curtailment_batch(&deduped).await?;
        self.repo
            .record_ingestion(date, periods_ok, records_ingested)
            .await?;

        info!(
            "Ingested {}: {} periods ok, {} failed, {} records",
            date, periods_ok, periods_failed, records_ingested
        );

        Ok(IngestionResult {
            date,
            periods_ok,
            periods_failed,
            records_fetched,
            records_ingested,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IngestionResult {
    pub date: NaiveDate,
    pub periods_ok: u32,
    pub periods_failed: u32,
    pub records_fetched: usize,
    pub records_ingested: usize,
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("all {PERIODS_PER_DAY} period fetches failed for {date}: {last_error}")]
    AllPeriodsFailed {
        date: NaiveDate,
        last_error: DataSourceError,
    },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockCurtailmentSource;
    use crate::db::migrations::init_db;
    use crate::domain::{CurtailmentRecord, Decimal, FarmId};
    use tempfile::TempDir;

    async fn setup_repo() -> (Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Arc::new(Repository::new(pool)), temp_dir)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 28).unwrap()
    }

    fn record(period: u8, farm: &str, volume: &str) -> CurtailmentRecord {
        let volume = Decimal::from_str_canonical(volume).unwrap();
        let price = Decimal::from_str_canonical("-52").unwrap();
        CurtailmentRecord::new(
            date(),
            SettlementPeriod::new(period).unwrap(),
            FarmId::new(farm.to_string()),
            "Test Wind Ltd".to_string(),
            volume,
            price,
            price,
            volume * price,
            true,
            false,
        )
    }

    #[tokio::test]
    async fn test_ingest_fetches_and_stores() {
        let source = Arc::new(
            MockCurtailmentSource::new()
                .with_record(record(1, "F1", "-100"))
                .with_record(record(2, "F1", "-50")),
        );
        let (repo, _temp) = setup_repo().await;
        let ingestor = Ingestor::new(source, repo.clone(), 4);

        let result = ingestor.ingest_date(date()).await.unwrap();
        assert_eq!(result.periods_ok, 48);
        assert_eq!(result.periods_failed, 0);
        assert_eq!(result.records_ingested, 2);

        let stored = repo.query_curtailment_date(date()).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let source = Arc::new(MockCurtailmentSource::new().with_record(record(1, "F1", "-100")));
        let (repo, _temp) = setup_repo().await;
        let ingestor = Ingestor::new(source, repo.clone(), 4);

        ingestor.ingest_date(date()).await.unwrap();
        ingestor.ingest_date(date()).await.unwrap();

        let stored = repo.query_curtailment_date(date()).await.unwrap();
        assert_eq!(stored.len(), 1, "rerun must not duplicate rows");
    }

    #[tokio::test]
    async fn test_positive_volumes_filtered_out() {
        // Offer acceptances (turn-up) are not curtailment.
        let source = Arc::new(
            MockCurtailmentSource::new()
                .with_record(record(1, "F1", "-100"))
                .with_record(record(1, "F2", "80")),
        );
        let (repo, _temp) = setup_repo().await;
        let ingestor = Ingestor::new(source, repo.clone(), 4);

        let result = ingestor.ingest_date(date()).await.unwrap();
        assert_eq!(result.records_fetched, 2);
        assert_eq!(result.records_ingested, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_then_rerun_no_duplicates() {
        // First run loses one period to a rate limit; rerun completes the
        // date without duplicating the periods that already landed.
        let source = Arc::new(
            MockCurtailmentSource::new()
                .with_record(record(1, "F1", "-100"))
                .with_record(record(2, "F1", "-50"))
                .with_failures(1, DataSourceError::RateLimited),
        );
        let (repo, _temp) = setup_repo().await;
        let ingestor = Ingestor::new(source, repo.clone(), 1);

        let first = ingestor.ingest_date(date()).await.unwrap();
        assert_eq!(first.periods_failed, 1);

        let second = ingestor.ingest_date(date()).await.unwrap();
        assert_eq!(second.periods_failed, 0);

        let stored = repo.query_curtailment_date(date()).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_all_periods_failed_is_error() {
        let source = Arc::new(
            MockCurtailmentSource::new().with_failures(48, DataSourceError::RateLimited),
        );
        let (repo, _temp) = setup_repo().await;
        let ingestor = Ingestor::new(source, repo.clone(), 4);

        let result = ingestor.ingest_date(date()).await;
        assert!(matches!(
            result,
            Err(IngestionError::AllPeriodsFailed { .. })
        ));
        // A fully failed date must not be marked ingested.
        assert!(repo.ingested_dates(date(), date()).await.unwrap().is_empty());
    }
}
