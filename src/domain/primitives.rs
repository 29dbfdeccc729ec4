//! Domain primitives: SettlementPeriod, FarmId.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of settlement periods in a UK settlement day.
///
/// Clock-change days have 46 or 50, but the upstream acceptances feed reports
/// them within the 1..=48 numbering as well.
pub const PERIODS_PER_DAY: u8 = 48;

/// Duration of one settlement period in seconds (30 minutes).
pub const PERIOD_SECONDS: f64 = 1800.0;

/// One of the 48 half-hour settlement periods in a day (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SettlementPeriod(u8);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("settlement period must be 1..=48, got {0}")]
pub struct InvalidPeriod(pub i64);

impl SettlementPeriod {
    /// Create a settlement period, validating the 1..=48 range.
    pub fn new(period: u8) -> Result<Self, InvalidPeriod> {
        if (1..=PERIODS_PER_DAY).contains(&period) {
            Ok(SettlementPeriod(period))
        } else {
            Err(InvalidPeriod(period as i64))
        }
    }

    /// Iterate all 48 periods of a day in order.
    pub fn all() -> impl Iterator<Item = SettlementPeriod> {
        (1..=PERIODS_PER_DAY).map(SettlementPeriod)
    }

    /// The 1-based period number.
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// The period number as i64, for database binds.
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
}

impl TryFrom<u8> for SettlementPeriod {
    type Error = InvalidPeriod;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SettlementPeriod::new(value)
    }
}

impl TryFrom<i64> for SettlementPeriod {
    type Error = InvalidPeriod;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| InvalidPeriod(value))
            .and_then(SettlementPeriod::new)
    }
}

impl From<SettlementPeriod> for u8 {
    fn from(value: SettlementPeriod) -> u8 {
        value.0
    }
}

impl std::fmt::Display for SettlementPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Balancing Mechanism Unit identifier for a generation unit (e.g. "T_MOWEO-1").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FarmId(pub String);

impl FarmId {
    /// Create a FarmId from a string.
    pub fn new(id: String) -> Self {
        FarmId(id)
    }

    /// Get the identifier as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FarmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
