//! Network difficulty schedule.
//!
//! An explicit lookup table loaded once by the driver and passed into the
//! calculator path. Lookup takes the latest entry at or before the requested
//! date; a date before the first entry is a typed error, never a default.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DifficultySchedule {
    entries: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug, Error)]
pub enum DifficultyError {
    #[error("no difficulty entry at or before {0}")]
    OutOfRange(NaiveDate),
    #[error("invalid difficulty {1} for {0}: must be positive and finite")]
    InvalidEntry(NaiveDate, f64),
    #[error("failed to read difficulty file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse difficulty file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ScheduleEntry {
    date: NaiveDate,
    difficulty: f64,
}

impl DifficultySchedule {
    /// Build a schedule from explicit (date, difficulty) entries.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, DifficultyError> {
        let mut map = BTreeMap::new();
        for (date, difficulty) in entries {
            if !difficulty.is_finite() || difficulty <= 0.0 {
                return Err(DifficultyError::InvalidEntry(date, difficulty));
            }
            map.insert(date, difficulty);
        }
        Ok(Self { entries: map })
    }

    /// Load a schedule from a JSON file of `[{"date": "...", "difficulty": n}]`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DifficultyError> {
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<ScheduleEntry> = serde_json::from_str(&content)?;
        Self::from_entries(entries.into_iter().map(|e| (e.date, e.difficulty)))
    }

    /// Coarse built-in table of historical difficulty epochs, used when no
    /// schedule file is configured.
    pub fn builtin() -> Self {
        let entries = [
            (2023, 1, 1, 3.44e13),
            (2023, 7, 1, 5.20e13),
            (2024, 1, 1, 7.35e13),
            (2024, 7, 1, 8.25e13),
            (2025, 1, 1, 1.10e14),
            (2025, 7, 1, 1.16e14),
        ]
        .into_iter()
        .filter_map(|(y, m, d, diff)| NaiveDate::from_ymd_opt(y, m, d).map(|date| (date, diff)));

        // Entries are hard-coded positive, from_entries cannot fail.
        Self::from_entries(entries).unwrap_or(Self {
            entries: BTreeMap::new(),
        })
    }

    /// Difficulty in force on `date`: the latest entry at or before it.
    pub fn lookup(&self, date: NaiveDate) -> Result<f64, DifficultyError> {
        self.entries
            .range(..=date)
            .next_back()
            .map(|(_, &d)| d)
            .ok_or(DifficultyError::OutOfRange(date))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
