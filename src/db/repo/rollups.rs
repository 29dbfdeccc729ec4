//! Rollup (summary table) operations for the repository.
//!
//! All writes are natural-key upserts; reads return rows in key order so a
//! rebuild over unchanged data reproduces the tables byte-identically.

use crate::domain::{
    DailyMiningSummary, DailySummary, MonthlyMiningSummary, MonthlySummary, YearlyMiningSummary,
    YearlySummary,
};
use chrono::NaiveDate;
use sqlx::Row;

use super::{date_from_str, date_to_str, decimal_from_column, Repository};

impl Repository {
    // =========================================================================
    // Daily curtailment summaries
    // =========================================================================

    pub async fn upsert_daily_summary(&self, summary: &DailySummary) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO daily_summaries (settlement_date, total_volume_mwh, total_payment, record_count)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(settlement_date) DO UPDATE SET
                total_volume_mwh = excluded.total_volume_mwh,
                total_payment = excluded.total_payment,
                record_count = excluded.record_count
            "#,
        )
        .bind(date_to_str(summary.settlement_date))
        .bind(summary.total_volume_mwh.to_canonical_string())
        .bind(summary.total_payment.to_canonical_string())
        .bind(summary.record_count)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_daily_summary(&self, date: NaiveDate) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM daily_summaries WHERE settlement_date = ?")
            .bind(date_to_str(date))
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_daily_summary(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, sqlx::Error> {
        Ok(self
            .query_daily_summaries(date, date)
            .await?
            .into_iter()
            .next())
    }

    /// Daily summaries for an inclusive date range, in date order.
    pub async fn query_daily_summaries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT settlement_date, total_volume_mwh, total_payment, record_count
            FROM daily_summaries
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
                let date_str: String = row.get("settlement_date");
                let volume: String = row.get("total_volume_mwh");
                let payment: String = row.get("total_payment");
                DailySummary {
                    settlement_date: date_from_str(&date_str),
                    total_volume_mwh: decimal_from_column(&volume, "total_volume_mwh"),
                    total_payment: decimal_from_column(&payment, "total_payment"),
                    record_count: row.get("record_count"),
                }
            })
            .collect())
    }

    // =========================================================================
    // Monthly curtailment summaries
    // =========================================================================

    pub async fn upsert_monthly_summary(
        &self,
        summary: &MonthlySummary,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO monthly_summaries (year, month, total_volume_mwh, total_payment, record_count)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(year, month) DO UPDATE SET
                total_volume_mwh = excluded.total_volume_mwh,
                total_payment = excluded.total_payment,
                record_count = excluded.record_count
            "#,
        )
        .bind(summary.year)
        .bind(summary.month as i64)
        .bind(summary.total_volume_mwh.to_canonical_string())
        .bind(summary.total_payment.to_canonical_string())
        .bind(summary.record_count)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_monthly_summary(&self, year: i32, month: u32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM monthly_summaries WHERE year = ? AND month = ?")
            .bind(year)
            .bind(month as i64)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_monthly_summary(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlySummary>, sqlx::Error> {
        Ok(self
            .query_monthly_summaries(year)
            .await?
            .into_iter()
            .find(|s| s.month == month))
    }

    /// Monthly summaries for one year, in month order.
    pub async fn query_monthly_summaries(
        &self,
        year: i32,
    ) -> Result<Vec<MonthlySummary>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT year, month, total_volume_mwh, total_payment, record_count
            FROM monthly_summaries
            WHERE year = ?
            ORDER BY month ASC
            "#,
        )
        .bind(year)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let volume: String = row.get("total_volume_mwh");
                let payment: String = row.get("total_payment");
                let month: i64 = row.get("month");
                MonthlySummary {
                    year: row.get("year"),
                    month: month as u32,
                    total_volume_mwh: decimal_from_column(&volume, "total_volume_mwh"),
                    total_payment: decimal_from_column(&payment, "total_payment"),
                    record_count: row.get("record_count"),
                }
            })
            .collect())
    }

    // =========================================================================
    // Yearly curtailment summaries
    // =========================================================================

    pub async fn upsert_yearly_summary(&self, summary: &YearlySummary) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO yearly_summaries (year, total_volume_mwh, total_payment, record_count)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(year) DO UPDATE SET
                total_volume_mwh = excluded.total_volume_mwh,
                total_payment = excluded.total_payment,
                record_count = excluded.record_count
            "#,
        )
        .bind(summary.year)
        .bind(summary.total_volume_mwh.to_canonical_string())
        .bind(summary.total_payment.to_canonical_string())
        .bind(summary.record_count)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_yearly_summary(&self, year: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM yearly_summaries WHERE year = ?")
            .bind(year)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_yearly_summary(
        &self,
        year: i32,
    ) -> Result<Option<YearlySummary>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT year, total_volume_mwh, total_payment, record_count
            FROM yearly_summaries
            WHERE year = ?
            "#,
        )
        .bind(year)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| {
            let volume: String = row.get("total_volume_mwh");
            let payment: String = row.get("total_payment");
            YearlySummary {
                year: row.get("year"),
                total_volume_mwh: decimal_from_column(&volume, "total_volume_mwh"),
                total_payment: decimal_from_column(&payment, "total_payment"),
                record_count: row.get("record_count"),
            }
        }))
    }

    /// All yearly summaries, in year order.
    pub async fn query_yearly_summaries(&self) -> Result<Vec<YearlySummary>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT year, total_volume_mwh, total_payment, record_count
            FROM yearly_summaries
            ORDER BY year ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let volume: String = row.get("total_volume_mwh");
                let payment: String = row.get("total_payment");
                YearlySummary {
                    year: row.get("year"),
                    total_volume_mwh: decimal_from_column(&volume, "total_volume_mwh"),
                    total_payment: decimal_from_column(&payment, "total_payment"),
                    record_count: row.get("record_count"),
                }
            })
            .collect())
    }

    // =========================================================================
    // Mining summaries (per hardware profile)
    // =========================================================================

    pub async fn upsert_daily_mining_summary(
        &self,
        summary: &DailyMiningSummary,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO daily_mining_summaries (settlement_date, profile_id, total_btc)
            VALUES (?, ?, ?)
            ON CONFLICT(settlement_date, profile_id) DO UPDATE SET
                total_btc = excluded.total_btc
            "#,
        )
        .bind(date_to_str(summary.settlement_date))
        .bind(summary.profile_id.as_str())
        .bind(summary.total_btc.to_canonical_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Delete all per-profile daily mining rows for one date.
    pub async fn delete_daily_mining_summaries(&self, date: NaiveDate) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM daily_mining_summaries WHERE settlement_date = ?")
            .bind(date_to_str(date))
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Daily mining summaries for an inclusive date range, in (date, profile)
    /// order.
    pub async fn query_daily_mining_summaries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMiningSummary>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT settlement_date, profile_id, total_btc
            FROM daily_mining_summaries
            WHERE settlement_date >= ? AND settlement_date <= ?
            ORDER BY settlement_date ASC, profile_id ASC
            "#,
        )
        .bind(date_to_str(from))
        .bind(date_to_str(to))
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let date_str: String = row.get("settlement_date");
                let btc: String = row.get("total_btc");
                DailyMiningSummary {
                    settlement_date: date_from_str(&date_str),
                    profile_id: row.get("profile_id"),
                    total_btc: decimal_from_column(&btc, "total_btc"),
                }
            })
            .collect())
    }

    pub async fn upsert_monthly_mining_summary(
        &self,
        summary: &MonthlyMiningSummary,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO monthly_mining_summaries (year, month, profile_id, total_btc)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(year, month, profile_id) DO UPDATE SET
                total_btc = excluded.total_btc
            "#,
        )
        .bind(summary.year)
        .bind(summary.month as i64)
        .bind(summary.profile_id.as_str())
        .bind(summary.total_btc.to_canonical_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_monthly_mining_summaries(
        &self,
        year: i32,
        month: u32,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM monthly_mining_summaries WHERE year = ? AND month = ?")
                .bind(year)
                .bind(month as i64)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected())
    }

    /// Monthly mining summaries for one year, in (month, profile) order.
    pub async fn query_monthly_mining_summaries(
        &self,
        year: i32,
    ) -> Result<Vec<MonthlyMiningSummary>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT year, month, profile_id, total_btc
            FROM monthly_mining_summaries
            WHERE year = ?
            ORDER BY month ASC, profile_id ASC
            "#,
        )
        .bind(year)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let btc: String = row.get("total_btc");
                let month: i64 = row.get("month");
                MonthlyMiningSummary {
                    year: row.get("year"),
                    month: month as u32,
                    profile_id: row.get("profile_id"),
                    total_btc: decimal_from_column(&btc, "total_btc"),
                }
            })
            .collect())
    }

    pub async fn upsert_yearly_mining_summary(
        &self,
        summary: &YearlyMiningSummary,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO yearly_mining_summaries (year, profile_id, total_btc)
            VALUES (?, ?, ?)
            ON CONFLICT(year, profile_id) DO UPDATE SET
                total_btc = excluded.total_btc
            "#,
        )
        .bind(summary.year)
        .bind(summary.profile_id.as_str())
        .bind(summary.total_btc.to_canonical_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_yearly_mining_summaries(&self, year: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM yearly_mining_summaries WHERE year = ?")
            .bind(year)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Yearly mining summaries for one year, in profile order.
    pub async fn query_yearly_mining_summaries(
        &self,
        year: i32,
    ) -> Result<Vec<YearlyMiningSummary>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT year, profile_id, total_btc
            FROM yearly_mining_summaries
            WHERE year = ?
            ORDER BY profile_id ASC
            "#,
        )
        .bind(year)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let btc: String = row.get("total_btc");
                YearlyMiningSummary {
                    year: row.get("year"),
                    profile_id: row.get("profile_id"),
                    total_btc: decimal_from_column(&btc, "total_btc"),
                }
            })
            .collect())
    }
}
