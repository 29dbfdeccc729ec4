//! Pure deduplication of curtailment batches.
//!
//! Upstream occasionally serves several acceptances for the same
//! (date, period, farm) key. They are merged before insert: volumes and
//! payments sum, the first acceptance's metadata (party, prices, flags) wins.

use crate::domain::CurtailmentRecord;
use std::collections::HashMap;

/// Merge duplicate (date, period, farm) records by summing volume and
/// payment. Output preserves first-seen order.
pub fn dedup_records(records: Vec<CurtailmentRecord>) -> Vec<CurtailmentRecord> {
    let mut merged: Vec<CurtailmentRecord> = Vec::with_capacity(records.len());
    let mut index_by_key: HashMap<_, usize> = HashMap::new();

    for record in records {
        match index_by_key.get(&record.natural_key()) {
            Some(&i) => {
                merged[i].volume_mwh += record.volume_mwh;
                merged[i].payment += record.payment;
            }
            None => {
                index_by_key.insert(record.natural_key(), merged.len());
                merged.push(record);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, FarmId, SettlementPeriod};
    use chrono::NaiveDate;

    fn record(period: u8, farm: &str, volume: &str, payment: &str) -> CurtailmentRecord {
        CurtailmentRecord::new(
            NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
            SettlementPeriod::new(period).unwrap(),
            FarmId::new(farm.to_string()),
            "Test Wind Ltd".to_string(),
            Decimal::from_str_canonical(volume).unwrap(),
            Decimal::from_str_canonical("-52").unwrap(),
            Decimal::from_str_canonical("-52").unwrap(),
            Decimal::from_str_canonical(payment).unwrap(),
            true,
            false,
        )
    }

    #[test]
    fn test_merges_duplicates_by_summing() {
        let merged = dedup_records(vec![
            record(1, "T_MOWEO-1", "-100", "5200"),
            record(1, "T_MOWEO-1", "-50", "2600"),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].volume_mwh.to_canonical_string(), "-150");
        assert_eq!(merged[0].payment.to_canonical_string(), "7800");
    }

    #[test]
    fn test_distinct_keys_untouched() {
        let input = vec![
            record(1, "T_MOWEO-1", "-100", "5200"),
            record(2, "T_MOWEO-1", "-100", "5200"),
            record(1, "T_MOWEO-2", "-100", "5200"),
        ];
        let merged = dedup_records(input.clone());
        assert_eq!(merged, input);
    }

    #[test]
    fn test_totals_preserved() {
        let input = vec![
            record(1, "T_MOWEO-1", "-100", "5200"),
            record(1, "T_MOWEO-1", "-25.5", "1326"),
            record(2, "T_MOWEO-2", "-10", "520"),
        ];
        let total_volume: Decimal = input.iter().map(|r| r.volume_mwh).sum();
        let total_payment: Decimal = input.iter().map(|r| r.payment).sum();

        let merged = dedup_records(input);
        assert_eq!(merged.len(), 2);
        let merged_volume: Decimal = merged.iter().map(|r| r.volume_mwh).sum();
        let merged_payment: Decimal = merged.iter().map(|r| r.payment).sum();
        assert_eq!(merged_volume, total_volume);
        assert_eq!(merged_payment, total_payment);
    }

    #[test]
    fn test_first_record_metadata_wins() {
        let mut second = record(1, "T_MOWEO-1", "-50", "2600");
        second.lead_party = "Other Party".to_string();
        second.so_flag = false;

        let merged = dedup_records(vec![record(1, "T_MOWEO-1", "-100", "5200"), second]);
        assert_eq!(merged[0].lead_party, "Test Wind Ltd");
        assert!(merged[0].so_flag);
    }

    #[test]
    fn test_empty_input() {
        assert!(dedup_records(Vec::new()).is_empty());
    }
}
