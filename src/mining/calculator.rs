//! Mining yield calculator.
//!
//! Pure function mapping (curtailed energy, hardware profile, network
//! difficulty) to a hypothetical BTC yield: how much the curtailed energy
//! would have mined had it powered the modeled ASIC fleet for that
//! settlement period instead of being turned down.

use crate::domain::{HardwareProfile, PERIOD_SECONDS};
use thiserror::Error;

/// Block subsidy in BTC (post-April-2024 halving).
pub const BLOCK_SUBSIDY_BTC: f64 = 3.125;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// Result of one yield estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldEstimate {
    /// Estimated BTC, rounded to 8 decimal places (satoshi precision).
    pub btc: f64,
    /// Number of hardware units the energy could power for the full period.
    pub hardware_units: f64,
}

impl YieldEstimate {
    /// The zero estimate, returned for non-positive volumes.
    pub fn zero() -> Self {
        Self {
            btc: 0.0,
            hardware_units: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculatorError {
    #[error("invalid curtailed volume: {0}")]
    InvalidVolume(f64),
    #[error("invalid network difficulty: {0}")]
    InvalidDifficulty(f64),
}

/// Estimate the hypothetical mining yield of `volume_mwh` of curtailed energy
/// over one 30-minute settlement period.
///
/// The energy is converted into an equivalent fleet size for the profile, the
/// fleet hashrate into an expected number of block rewards via the difficulty
/// model `hashrate / (difficulty * 2^32 / period_seconds)`, and the expected
/// rewards into BTC at the fixed block subsidy.
///
/// Zero or negative volume yields the zero estimate. Non-finite volume and
/// non-positive or non-finite difficulty are contract violations.
pub fn estimate_yield(
    volume_mwh: f64,
    profile: &HardwareProfile,
    difficulty: f64,
) -> Result<YieldEstimate, CalculatorError> {
    if !volume_mwh.is_finite() {
        return Err(CalculatorError::InvalidVolume(volume_mwh));
    }
    if !difficulty.is_finite() || difficulty <= 0.0 {
        return Err(CalculatorError::InvalidDifficulty(difficulty));
    }
    if volume_mwh <= 0.0 {
        return Ok(YieldEstimate::zero());
    }

    let energy_wh = volume_mwh * 1e6;
    let hardware_units = energy_wh / profile.period_energy_wh();

    let fleet_hashrate_hs = hardware_units * profile.hashrate_hs();
    let expected_rewards = fleet_hashrate_hs / (difficulty * TWO_POW_32 / PERIOD_SECONDS);

    let btc = round_to_satoshi(expected_rewards * BLOCK_SUBSIDY_BTC);

    Ok(YieldEstimate {
        btc,
        hardware_units,
    })
}

/// Round a BTC amount to 8 decimal places.
fn round_to_satoshi(btc: f64) -> f64 {
    (btc * 1e8).round() / 1e8
}
