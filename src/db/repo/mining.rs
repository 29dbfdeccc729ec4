//! Derived mining-yield operations and reconciliation queries.

use crate::domain::{FarmId, MiningYieldRecord};
use chrono::NaiveDate;
use sqlx::Row;

use super::{
    date_from_str, date_to_str, decimal_from_column, period_from_column, DateCoverageRow,
    MissingYieldRow, Repository,
};

/// `SELECT ? AS profile_id UNION ALL SELECT ? ...` subquery for binding a
/// profile-id list into the set-difference queries.
fn profiles_subquery(count: usize) -> String {
    let mut sql = String::from("SELECT ? AS profile_id");
    for _ in 1..count {
        sql.push_str(" UNION ALL SELECT ?");
    }
    sql
}

impl Repository {
    /// Replace all derived yield rows for one date: delete-all-then-reinsert-
    /// all inside a single transaction, so an interrupted run can never leave
    /// the date half-written.
    ///
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn replace_mining_for_date(
        &self,
        date: NaiveDate,
        records: &[MiningYieldRecord],
    ) -> Result<usize, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM mining_potential WHERE settlement_date = ?")
            .bind(date_to_str(date))
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0usize;
        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO mining_potential (
                    settlement_date, settlement_period, farm_id, profile_id,
                    estimated_btc, hardware_units, difficulty, computed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(date_to_str(record.settlement_date))
            .bind(record.settlement_period.as_i64())
            .bind(record.farm_id.as_str())
            .bind(record.profile_id.as_str())
            .bind(record.estimated_btc.to_canonical_string())
            .bind(record.hardware_units)
            .bind(record.difficulty)
            .bind(record.computed_at)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Query all derived yield rows for one date, in natural-key order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_mining_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<MiningYieldRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT settlement_date, settlement_period, farm_id, profile_id,
                   estimated_btc, hardware_units, difficulty, computed_at
            FROM mining_potential
            WHERE settlement_date = ?
            ORDER BY settlement_period ASC, farm_id ASC, profile_id ASC
            "#,
        )
        .bind(date_to_str(date))
        .fetch_all(self.pool())
        .await?;

        let records = rows
            .iter()
            .map(|row| {
                let date_str: String = row.get("settlement_date");
                let btc_str: String = row.get("estimated_btc");
                MiningYieldRecord {
                    settlement_date: date_from_str(&date_str),
                    settlement_period: period_from_column(row.get("settlement_period")),
                    farm_id: FarmId::new(row.get("farm_id")),
                    profile_id: row.get("profile_id"),
                    estimated_btc: decimal_from_column(&btc_str, "estimated_btc"),
                    hardware_units: row.get("hardware_units"),
                    difficulty: row.get("difficulty"),
                    computed_at: row.get("computed_at"),
                }
            })
            .collect();

        Ok(records)
    }

    /// The reconciliation set difference: tuples present in
    /// `curtailment_records` (crossed with the supported profiles) but absent
    /// from `mining_potential`, for an inclusive date range.
    ///
    /// Computed as one query, never as a per-tuple existence probe.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn missing_yield_tuples(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        profile_ids: &[&str],
    ) -> Result<Vec<MissingYieldRow>, sqlx::Error> {
        if profile_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT c.settlement_date, c.settlement_period, c.farm_id, p.profile_id
            FROM (
                SELECT DISTINCT settlement_date, settlement_period, farm_id
                FROM curtailment_records
                WHERE settlement_date >= ? AND settlement_date <= ?
            ) c
            CROSS JOIN ({}) p
            LEFT JOIN mining_potential m
                ON m.settlement_date = c.settlement_date
               AND m.settlement_period = c.settlement_period
               AND m.farm_id = c.farm_id
               AND m.profile_id = p.profile_id
            WHERE m.farm_id IS NULL
            ORDER BY c.settlement_date ASC, c.settlement_period ASC,
                     c.farm_id ASC, p.profile_id ASC
            "#,
            profiles_subquery(profile_ids.len())
        );

        let mut query = sqlx::query(&sql).bind(date_to_str(from)).bind(date_to_str(to));
        for profile_id in profile_ids {
            query = query.bind(*profile_id);
        }

        let rows = query.fetch_all(self.pool()).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let date_str: String = row.get("settlement_date");
                MissingYieldRow {
                    settlement_date: date_from_str(&date_str),
                    settlement_period: period_from_column(row.get("settlement_period")),
                    farm_id: FarmId::new(row.get("farm_id")),
                    profile_id: row.get("profile_id"),
                }
            })
            .collect())
    }

    /// Per-date expected/present derived-row counts over an inclusive range,
    /// using the same expected set as `missing_yield_tuples`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn date_coverage(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        profile_ids: &[&str],
    ) -> Result<Vec<DateCoverageRow>, sqlx::Error> {
        if profile_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT c.settlement_date,
                   COUNT(*) AS expected,
                   SUM(CASE WHEN m.farm_id IS NOT NULL THEN 1 ELSE 0 END) AS present
            FROM (
                SELECT DISTINCT settlement_date, settlement_period, farm_id
                FROM curtailment_records
                WHERE settlement_date >= ? AND settlement_date <= ?
            ) c
            CROSS JOIN ({}) p
            LEFT JOIN mining_potential m
                ON m.settlement_date = c.settlement_date
               AND m.settlement_period = c.settlement_period
               AND m.farm_id = c.farm_id
               AND m.profile_id = p.profile_id
            GROUP BY c.settlement_date
            ORDER BY c.settlement_date ASC
            "#,
            profiles_subquery(profile_ids.len())
        );

        let mut query = sqlx::query(&sql).bind(date_to_str(from)).bind(date_to_str(to));
        for profile_id in profile_ids {
            query = query.bind(*profile_id);
        }

        let rows = query.fetch_all(self.pool()).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let date_str: String = row.get("settlement_date");
                DateCoverageRow {
                    settlement_date: date_from_str(&date_str),
                    expected: row.get("expected"),
                    present: row.get("present"),
                }
            })
            .collect())
    }
}
