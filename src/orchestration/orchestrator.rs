//! Pipeline orchestration: ingest, derive yields, rebuild rollups, verify.

use crate::db::Repository;
use crate::domain::{Decimal, HardwareProfile, MiningYieldRecord};
use crate::mining::{estimate_yield, DifficultyError, DifficultySchedule};
use crate::orchestration::ingest::{Ingestor, IngestionError};
use crate::reconcile::ReconciliationChecker;
use crate::rollup::{AggregateRebuilder, RollupError};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

/// Advisory per-date locks. Concurrent runs targeting the same date serialize
/// here; different dates proceed in parallel.
#[derive(Default)]
struct DateLocks {
    inner: Mutex<HashMap<NaiveDate, Arc<tokio::sync::Mutex<()>>>>,
}

impl DateLocks {
    fn lock_for(&self, date: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(date)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Outcome of processing one date, returned to the driver. `complete` is true
/// only when the final missing set for the date is empty and no period fetch
/// failed; a partial result is never reported as success.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub date: NaiveDate,
    pub periods_failed: u32,
    pub records_ingested: usize,
    pub yields_computed: usize,
    pub yields_skipped: usize,
    pub missing_after: i64,
    pub percent_complete: f64,
    pub complete: bool,
}

/// Outcome of a range gap-fill pass.
#[derive(Debug, Clone, Serialize)]
pub struct GapFillOutcome {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub missing_before: usize,
    pub dates_processed: usize,
    pub dates_failed: Vec<(NaiveDate, String)>,
    pub missing_after: i64,
    pub percent_complete: f64,
    pub complete: bool,
}

pub struct Orchestrator {
    ingestor: Ingestor,
    repo: Arc<Repository>,
    checker: ReconciliationChecker,
    rebuilder: AggregateRebuilder,
    profiles: Vec<HardwareProfile>,
    difficulty: Arc<DifficultySchedule>,
    date_locks: DateLocks,
}

impl Orchestrator {
    pub fn new(
        ingestor: Ingestor,
        repo: Arc<Repository>,
        checker: ReconciliationChecker,
        rebuilder: AggregateRebuilder,
        profiles: Vec<HardwareProfile>,
        difficulty: Arc<DifficultySchedule>,
    ) -> Self {
        Self {
            ingestor,
            repo,
            checker,
            rebuilder,
            profiles,
            difficulty,
            date_locks: DateLocks::default(),
        }
    }

    /// Run the full pipeline for one date: ingest, derive yields for every
    /// (period, farm) x profile, rebuild rollups, then re-check.
    ///
    /// Rollups are only rebuilt after all period-level writes for the date
    /// have committed, so they never observe a half-written day.
    pub async fn process_date(
        &self,
        date: NaiveDate,
    ) -> Result<ProcessOutcome, OrchestrationError> {
        let lock = self.date_locks.lock_for(date);
        let _guard = lock.lock().await;

        let ingestion = self.ingestor.ingest_date(date).await?;
        let (yields_computed, yields_skipped) = self.derive_date(date).await?;
        self.rebuilder.rebuild_for_date(date).await?;

        let report = self.checker.report(date, date).await?;
        let complete = report.is_complete() && ingestion.periods_failed == 0;
        if !complete {
            warn!(
                "Date {} not fully reconciled: {} missing, {} periods failed",
                date, report.total_missing, ingestion.periods_failed
            );
        }

        Ok(ProcessOutcome {
            date,
            periods_failed: ingestion.periods_failed,
            records_ingested: ingestion.records_ingested,
            yields_computed,
            yields_skipped,
            missing_after: report.total_missing,
            percent_complete: report.percent_complete,
            complete,
        })
    }

    /// Recompute derived yields and rollups for every date in the range that
    /// the checker reports as missing tuples, without refetching from the
    /// upstream. A failure on one date is recorded and does not abort the
    /// others.
    pub async fn fill_gaps(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<GapFillOutcome, OrchestrationError> {
        let missing = self.checker.missing_tuples(from, to).await?;
        let missing_before = missing.len();
        let dates: BTreeSet<NaiveDate> = missing.iter().map(|m| m.settlement_date).collect();

        let mut dates_processed = 0usize;
        let mut dates_failed = Vec::new();

        for date in dates {
            let lock = self.date_locks.lock_for(date);
            let _guard = lock.lock().await;

            let result = async {
                self.derive_date(date).await?;
                self.rebuilder.rebuild_for_date(date).await?;
                Ok::<(), OrchestrationError>(())
            }
            .await;

            match result {
                Ok(()) => dates_processed += 1,
                Err(e) => {
                    warn!("Gap fill failed for {}: {}", date, e);
                    dates_failed.push((date, e.to_string()));
                }
            }
        }

        let report = self.checker.report(from, to).await?;
        info!(
            "Gap fill {}..{}: {} dates processed, {} failed, {} tuples still missing",
            from,
            to,
            dates_processed,
            dates_failed.len(),
            report.total_missing
        );

        Ok(GapFillOutcome {
            from,
            to,
            missing_before,
            dates_processed,
            dates_failed,
            missing_after: report.total_missing,
            percent_complete: report.percent_complete,
            complete: report.is_complete(),
        })
    }

    /// Compute yields for every curtailment record of the date under every
    /// supported profile and replace the date's derived rows in one
    /// transaction. Returns (computed, skipped) counts; a calculator error on
    /// one record skips that tuple without aborting the rest.
    async fn derive_date(&self, date: NaiveDate) -> Result<(usize, usize), OrchestrationError> {
        let difficulty = self.difficulty.lookup(date)?;
        let records = self.repo.query_curtailment_date(date).await?;
        let computed_at = chrono::Utc::now().timestamp_millis();

        let mut yields = Vec::with_capacity(records.len() * self.profiles.len());
        let mut skipped = 0usize;

        for record in &records {
            for profile in &self.profiles {
                match estimate_yield(record.curtailed_mwh().to_f64_lossy(), profile, difficulty) {
                    Ok(estimate) => yields.push(MiningYieldRecord {
                        settlement_date: record.settlement_date,
                        settlement_period: record.settlement_period,
                        farm_id: record.farm_id.clone(),
                        profile_id: profile.id.to_string(),
                        estimated_btc: Decimal::from_f64_btc(estimate.btc).unwrap_or_default(),
                        hardware_units: estimate.hardware_units,
                        difficulty,
                        computed_at,
                    }),
                    Err(e) => {
                        warn!(
                            "Yield calculation failed for {} period {} farm {} profile {}: {}",
                            date, record.settlement_period, record.farm_id, profile.id, e
                        );
                        skipped += 1;
                    }
                }
            }
        }

        let computed = self.repo.replace_mining_for_date(date, &yields).await?;
        Ok((computed, skipped))
    }
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Rollup(#[from] RollupError),
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockCurtailmentSource;
    use crate::db::migrations::init_db;
    use crate::domain::{
        supported_profile_ids, CurtailmentRecord, FarmId, SettlementPeriod, SUPPORTED_PROFILES,
    };
    use tempfile::TempDir;

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

    async fn setup(source: MockCurtailmentSource) -> (Orchestrator, Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));

        let ingestor = Ingestor::new(Arc::new(source), repo.clone(), 4);
        let checker = ReconciliationChecker::new(
            repo.clone(),
            supported_profile_ids().iter().map(|s| s.to_string()).collect(),
        );
        let rebuilder = AggregateRebuilder::new(repo.clone());
        let difficulty = Arc::new(
            DifficultySchedule::from_entries([(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 1.1e14)])
                .unwrap(),
        );

        let orchestrator = Orchestrator::new(
            ingestor,
            repo.clone(),
            checker,
            rebuilder,
            SUPPORTED_PROFILES.to_vec(),
            difficulty,
        );
        (orchestrator, repo, temp_dir)
    }

    #[tokio::test]
    async fn test_process_date_end_to_end() {
        let mut source = MockCurtailmentSource::new();
        for period in 1..=48u8 {
            source = source.with_record(record(period, "F1", "-100"));
        }
        let (orchestrator, repo, _temp) = setup(source).await;

        let outcome = orchestrator.process_date(date()).await.unwrap();
        assert!(outcome.complete);
        assert_eq!(outcome.records_ingested, 48);
        assert_eq!(outcome.yields_computed, 48 * 3);
        assert_eq!(outcome.yields_skipped, 0);
        assert_eq!(outcome.missing_after, 0);
        assert!((outcome.percent_complete - 100.0).abs() < 1e-9);

        // All 48 periods share fixed inputs, so all yields are identical and
        // the daily rollup sums the full 4800 MWh.
        let yields = repo.query_mining_date(date()).await.unwrap();
        let first = yields
            .iter()
            .find(|y| y.profile_id == "s19j_pro")
            .unwrap()
            .estimated_btc;
        assert!(yields
            .iter()
            .filter(|y| y.profile_id == "s19j_pro")
            .all(|y| y.estimated_btc == first));

        let daily = repo.get_daily_summary(date()).await.unwrap().unwrap();
        assert_eq!(daily.total_volume_mwh.to_canonical_string(), "4800");
    }

    #[tokio::test]
    async fn test_process_date_idempotent() {
        let source = MockCurtailmentSource::new().with_record(record(1, "F1", "-100"));
        let (orchestrator, repo, _temp) = setup(source).await;

        orchestrator.process_date(date()).await.unwrap();
        let first_yields = repo.query_mining_date(date()).await.unwrap();
        let first_daily = repo.get_daily_summary(date()).await.unwrap();

        let outcome = orchestrator.process_date(date()).await.unwrap();
        assert!(outcome.complete);

        let second_yields = repo.query_mining_date(date()).await.unwrap();
        assert_eq!(first_yields.len(), second_yields.len());
        // computed_at differs between runs; the estimates must not.
        for (a, b) in first_yields.iter().zip(&second_yields) {
            assert_eq!(a.estimated_btc, b.estimated_btc);
            assert_eq!(a.profile_id, b.profile_id);
        }
        assert_eq!(repo.get_daily_summary(date()).await.unwrap(), first_daily);
    }

    #[tokio::test]
    async fn test_fill_gaps_completes_missing_profiles() {
        let source = MockCurtailmentSource::new()
            .with_record(record(1, "F1", "-100"))
            .with_record(record(2, "F1", "-50"));
        let (orchestrator, repo, _temp) = setup(source).await;

        // Ingest without deriving, then let the gap-fill pass derive.
        orchestrator.ingestor.ingest_date(date()).await.unwrap();
        assert!(repo.query_mining_date(date()).await.unwrap().is_empty());

        let outcome = orchestrator.fill_gaps(date(), date()).await.unwrap();
        assert_eq!(outcome.missing_before, 2 * 3);
        assert_eq!(outcome.dates_processed, 1);
        assert!(outcome.dates_failed.is_empty());
        assert_eq!(outcome.missing_after, 0);
        assert!(outcome.complete);

        // Checker and calculator agree: a second pass finds nothing to do.
        let again = orchestrator.fill_gaps(date(), date()).await.unwrap();
        assert_eq!(again.missing_before, 0);
        assert_eq!(again.dates_processed, 0);
        assert!(again.complete);
    }

    #[tokio::test]
    async fn test_incomplete_never_reported_complete() {
        // One period is lost to a rate limit on the single ingest attempt.
        let mut source = MockCurtailmentSource::new();
        for period in 1..=48u8 {
            source = source.with_record(record(period, "F1", "-100"));
        }
        let source = source.with_failures(1, crate::datasource::DataSourceError::RateLimited);
        let (orchestrator, _repo, _temp) = setup(source).await;

        let outcome = orchestrator.process_date(date()).await.unwrap();
        assert_eq!(outcome.periods_failed, 1);
        assert!(!outcome.complete, "a lossy run must not report success");
    }
}
