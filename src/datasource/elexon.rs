//! Elexon Insights API client.

use super::{CurtailmentSource, DataSourceError};
use crate::domain::{CurtailmentRecord, Decimal, FarmId, SettlementPeriod};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Curtailment source backed by the Elexon Insights bid-offer acceptances
/// endpoint.
#[derive(Debug, Clone)]
pub struct ElexonSource {
    client: Client,
    base_url: String,
    retry_initial_delay: Duration,
    retry_max_elapsed: Duration,
}

impl ElexonSource {
    /// Create a new Elexon source with an explicit per-request timeout and
    /// retry budget derived from the configured attempt count.
    pub fn new(base_url: String, timeout: Duration, max_retry_attempts: u32) -> Self {
        let retry_initial_delay = Duration::from_millis(500);
        // Geometric series bound: delays double per attempt from the initial.
        let retry_max_elapsed =
            retry_initial_delay * (2u32.saturating_pow(max_retry_attempts).saturating_sub(1));
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
            retry_initial_delay,
            retry_max_elapsed,
        }
    }

    /// Create with the public Elexon Insights base URL and default retry policy.
    pub fn default_url() -> Self {
        Self::new(
            "https://data.elexon.co.uk/bmrs/api/v1".to_string(),
            Duration::from_secs(30),
            5,
        )
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.retry_initial_delay,
            max_elapsed_time: Some(self.retry_max_elapsed),
            ..Default::default()
        }
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, DataSourceError> {
        let url = format!("{}{}", self.base_url, path);

        retry(self.retry_policy(), || async {
            let response = self
                .client
                .get(&url)
                .query(query)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl CurtailmentSource for ElexonSource {
    async fn fetch_period(
        &self,
        date: NaiveDate,
        period: SettlementPeriod,
    ) -> Result<Vec<CurtailmentRecord>, DataSourceError> {
        debug!("Fetching acceptances for date={}, period={}", date, period);

        let query = [
            ("settlementDate", date.format("%Y-%m-%d").to_string()),
            ("settlementPeriod", period.to_string()),
            ("format", "json".to_string()),
        ];

        let response = self.get_json("/balancing/acceptances/all", &query).await?;

        let items = response
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                DataSourceError::ParseError("Expected data array in response".to_string())
            })?;

        let mut records = Vec::new();
        for item in items {
            match parse_acceptance(item, date, period) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Failed to parse acceptance ({}): {}", e, item);
                }
            }
        }

        Ok(records)
    }
}

fn parse_acceptance(
    item: &serde_json::Value,
    date: NaiveDate,
    period: SettlementPeriod,
) -> Result<CurtailmentRecord, DataSourceError> {
    let bm_unit = item
        .get("bmUnit")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing bmUnit field".to_string()))?;

    let lead_party = item
        .get("leadPartyName")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing leadPartyName field".to_string()))?;

    let volume = parse_decimal_field(item, "volume")?;
    let original_price = parse_decimal_field(item, "originalPrice")?;
    let final_price = parse_decimal_field(item, "finalPrice")?;
    let payment = volume * final_price;

    let so_flag = item.get("soFlag").and_then(|v| v.as_bool()).unwrap_or(false);
    let cadl_flag = item
        .get("cadlFlag")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Ok(CurtailmentRecord::new(
        date,
        period,
        FarmId::new(bm_unit.to_string()),
        lead_party.to_string(),
        volume,
        original_price,
        final_price,
        payment,
        so_flag,
        cadl_flag,
    ))
}

/// Parse a numeric field that the upstream serves either as a JSON number or
/// as a string. NaN or exponents the decimal type cannot hold are parse
/// errors, never coerced to zero.
fn parse_decimal_field(
    item: &serde_json::Value,
    key: &str,
) -> Result<Decimal, DataSourceError> {
    let value = item
        .get(key)
        .ok_or_else(|| DataSourceError::ParseError(format!("Missing {} field", key)))?;

    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(DataSourceError::ParseError(format!(
                "Field {} has unexpected type: {}",
                key, other
            )))
        }
    };

    Decimal::from_str_canonical(&text)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 28).unwrap()
    }

    fn period() -> SettlementPeriod {
        SettlementPeriod::new(12).unwrap()
    }

    fn acceptance_json() -> serde_json::Value {
        json!({
            "bmUnit": "T_MOWEO-1",
            "leadPartyName": "Moray Offshore Windfarm (East) Ltd",
            "volume": -100.5,
            "originalPrice": -52.0,
            "finalPrice": -52.0,
            "soFlag": true,
            "cadlFlag": false
        })
    }

    #[test]
    fn test_parse_acceptance_complete() {
        let record = parse_acceptance(&acceptance_json(), date(), period()).unwrap();
        assert_eq!(record.farm_id.as_str(), "T_MOWEO-1");
        assert_eq!(record.volume_mwh.to_canonical_string(), "-100.5");
        assert_eq!(record.final_price.to_canonical_string(), "-52");
        // payment = volume * final price
        assert_eq!(record.payment.to_canonical_string(), "5226");
        assert!(record.so_flag);
        assert!(!record.cadl_flag);
        assert!(record.is_curtailment());
    }

    #[test]
    fn test_parse_acceptance_missing_bm_unit() {
        let mut item = acceptance_json();
        item.as_object_mut().unwrap().remove("bmUnit");
        let result = parse_acceptance(&item, date(), period());
        assert!(matches!(result, Err(DataSourceError::ParseError(_))));
    }

    #[test]
    fn test_parse_acceptance_missing_volume() {
        let mut item = acceptance_json();
        item.as_object_mut().unwrap().remove("volume");
        let result = parse_acceptance(&item, date(), period());
        assert!(matches!(result, Err(DataSourceError::ParseError(_))));
    }

    #[test]
    fn test_parse_acceptance_malformed_volume() {
        let mut item = acceptance_json();
        item["volume"] = json!("not-a-number");
        let result = parse_acceptance(&item, date(), period());
        assert!(matches!(result, Err(DataSourceError::ParseError(_))));
    }

    #[test]
    fn test_parse_accepts_string_numerics() {
        let mut item = acceptance_json();
        item["volume"] = json!("-75.25");
        let record = parse_acceptance(&item, date(), period()).unwrap();
        assert_eq!(record.volume_mwh.to_canonical_string(), "-75.25");
    }

    #[test]
    fn test_parse_flags_default_false() {
        let mut item = acceptance_json();
        item.as_object_mut().unwrap().remove("soFlag");
        item.as_object_mut().unwrap().remove("cadlFlag");
        let record = parse_acceptance(&item, date(), period()).unwrap();
        assert!(!record.so_flag);
        assert!(!record.cadl_flag);
    }
}
