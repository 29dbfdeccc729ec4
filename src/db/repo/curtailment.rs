//! Curtailment record and ingestion-log operations for the repository.

use crate::domain::{CurtailmentRecord, FarmId};
use chrono::NaiveDate;
use sqlx::Row;

use super::{date_from_str, date_to_str, decimal_from_column, period_from_column, Repository};

impl Repository {
    /// Upsert a batch of curtailment records in a single transaction,
    /// replacing by natural key so retried runs cannot create duplicates.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_curtailment_batch(
        &self,
        records: &[CurtailmentRecord],
    ) -> Result<usize, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let mut written = 0usize;

        let mut tx = self.pool().begin().await?;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO curtailment_records (
                    settlement_date, settlement_period, farm_id, lead_party,
                    volume_mwh, original_price, final_price, payment,
                    so_flag, cadl_flag, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(settlement_date, settlement_period, farm_id) DO UPDATE SET
                    lead_party = excluded.lead_party,
                    volume_mwh = excluded.volume_mwh,
                    original_price = excluded.original_price,
                    final_price = excluded.final_price,
                    payment = excluded.payment,
                    so_flag = excluded.so_flag,
                    cadl_flag = excluded.cadl_flag
                "#,
            )
            .bind(date_to_str(record.settlement_date))
            .bind(record.settlement_period.as_i64())
            .bind(record.farm_id.as_str())
            .bind(record.lead_party.as_str())
            .bind(record.volume_mwh.to_canonical_string())
            .bind(record.original_price.to_canonical_string())
            .bind(record.final_price.to_canonical_string())
            .bind(record.payment.to_canonical_string())
            .bind(record.so_flag as i64)
            .bind(record.cadl_flag as i64)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Query all curtailment records for one date, in natural-key order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_curtailment_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<CurtailmentRecord>, sqlx::Error> {
        self.query_curtailment_range(date, date).await
    }

    /// Query curtailment records for an inclusive date range, in natural-key
    /// order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_curtailment_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CurtailmentRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT settlement_date, settlement_period, farm_id, lead_party,
                   volume_mwh, original_price, final_price, payment,
                   so_flag, cadl_flag
            FROM curtailment_records
            WHERE settlement_date >= ? AND settlement_date <= ?
            ORDER BY settlement_date ASC, settlement_period ASC, farm_id ASC
            "#,
        )
        .bind(date_to_str(from))
        .bind(date_to_str(to))
        .fetch_all(self.pool())
        .await?;

        let records = rows
            .iter()
            .map(|row| {
                let date_str: String = row.get("settlement_date");
                let volume: String = row.get("volume_mwh");
                let original_price: String = row.get("original_price");
                let final_price: String = row.get("final_price");
                let payment: String = row.get("payment");
                let so_flag: i64 = row.get("so_flag");
                let cadl_flag: i64 = row.get("cadl_flag");

                CurtailmentRecord::new(
                    date_from_str(&date_str),
                    period_from_column(row.get("settlement_period")),
                    FarmId::new(row.get("farm_id")),
                    row.get("lead_party"),
                    decimal_from_column(&volume, "volume_mwh"),
                    decimal_from_column(&original_price, "original_price"),
                    decimal_from_column(&final_price, "final_price"),
                    decimal_from_column(&payment, "payment"),
                    so_flag != 0,
                    cadl_flag != 0,
                )
            })
            .collect();

        Ok(records)
    }

    /// Delete all curtailment records for one date (full date reprocessing).
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete_curtailment_date(&self, date: NaiveDate) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM curtailment_records WHERE settlement_date = ?")
            .bind(date_to_str(date))
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Record that a date was ingested (how many periods were fetched and how
    /// many records landed). Upserts by date.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn record_ingestion(
        &self,
        date: NaiveDate,
        periods_fetched: u32,
        records_ingested: usize,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO ingestion_log (settlement_date, periods_fetched, records_ingested, fetched_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(settlement_date) DO UPDATE SET
                periods_fetched = excluded.periods_fetched,
                records_ingested = excluded.records_ingested,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(date_to_str(date))
        .bind(periods_fetched as i64)
        .bind(records_ingested as i64)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Dates within the inclusive range that have an ingestion-log entry.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn ingested_dates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT settlement_date
            FROM ingestion_log
            WHERE settlement_date >= ? AND settlement_date <= ?
            ORDER BY settlement_date ASC
            "#,
        )
        .bind(date_to_str(from))
        .bind(date_to_str(to))
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let s: String = row.get("settlement_date");
                date_from_str(&s)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{Decimal, SettlementPeriod};
    use tempfile::TempDir;

    async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn make_record(period: u8, farm: &str, volume: &str) -> CurtailmentRecord {
        let volume = Decimal::from_str_canonical(volume).unwrap();
        let price = Decimal::from_str_canonical("-52").unwrap();
        CurtailmentRecord::new(
            NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
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
    async fn test_upsert_and_query_roundtrip() {
        let (repo, _temp) = setup_repo().await;
        let records = vec![
            make_record(1, "T_MOWEO-1", "-100.5"),
            make_record(2, "T_MOWEO-1", "-80"),
        ];

        let written = repo.upsert_curtailment_batch(&records).await.unwrap();
        assert_eq!(written, 2);

        let date = NaiveDate::from_ymd_opt(2025, 3, 28).unwrap();
        let got = repo.query_curtailment_date(date).await.unwrap();
        assert_eq!(got, records);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_natural_key() {
        let (repo, _temp) = setup_repo().await;
        let date = NaiveDate::from_ymd_opt(2025, 3, 28).unwrap();

        repo.upsert_curtailment_batch(&[make_record(1, "T_MOWEO-1", "-100")])
            .await
            .unwrap();
        repo.upsert_curtailment_batch(&[make_record(1, "T_MOWEO-1", "-150")])
            .await
            .unwrap();

        let got = repo.query_curtailment_date(date).await.unwrap();
        assert_eq!(got.len(), 1, "retried upsert must not duplicate");
        assert_eq!(got[0].volume_mwh.to_canonical_string(), "-150");
    }

    #[tokio::test]
    async fn test_delete_date() {
        let (repo, _temp) = setup_repo().await;
        let date = NaiveDate::from_ymd_opt(2025, 3, 28).unwrap();

        repo.upsert_curtailment_batch(&[
            make_record(1, "T_MOWEO-1", "-100"),
            make_record(1, "T_MOWEO-2", "-50"),
        ])
        .await
        .unwrap();

        let deleted = repo.delete_curtailment_date(date).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(repo.query_curtailment_date(date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingestion_log_roundtrip() {
        let (repo, _temp) = setup_repo().await;
        let date = NaiveDate::from_ymd_opt(2025, 3, 28).unwrap();

        assert!(repo.ingested_dates(date, date).await.unwrap().is_empty());

        repo.record_ingestion(date, 48, 96).await.unwrap();
        repo.record_ingestion(date, 48, 100).await.unwrap();

        let dates = repo.ingested_dates(date, date).await.unwrap();
        assert_eq!(dates, vec![date]);
    }
}
