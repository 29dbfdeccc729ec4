//! Hardware profiles used for the hypothetical mining valuation.
//!
//! A profile is plain data: a (hashrate, power draw) pair for one modeled
//! device class. The supported set is closed and enumerable.

use serde::{Deserialize, Serialize};

/// One modeled ASIC class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Stable identifier used as part of the mining_potential natural key.
    pub id: &'static str,
    /// Hashrate of one unit in TH/s.
    pub hashrate_ths: f64,
    /// Power draw of one unit in watts.
    pub power_w: f64,
}

impl HardwareProfile {
    pub const fn new(id: &'static str, hashrate_ths: f64, power_w: f64) -> Self {
        Self {
            id,
            hashrate_ths,
            power_w,
        }
    }

    /// Hashrate of one unit in H/s.
    pub fn hashrate_hs(&self) -> f64 {
        self.hashrate_ths * 1e12
    }

    /// Energy one unit consumes over a 30-minute settlement period, in Wh.
    pub fn period_energy_wh(&self) -> f64 {
        self.power_w * 0.5
    }
}

/// The supported device classes.
pub const SUPPORTED_PROFILES: &[HardwareProfile] = &[
    HardwareProfile::new("s19j_pro", 100.0, 3050.0),
    HardwareProfile::new("s19_xp", 140.0, 3010.0),
    HardwareProfile::new("s21", 200.0, 3550.0),
];

/// Look up a supported profile by id.
pub fn profile_by_id(id: &str) -> Option<&'static HardwareProfile> {
    SUPPORTED_PROFILES.iter().find(|p| p.id == id)
}

/// Ids of all supported profiles, in declaration order.
pub fn supported_profile_ids() -> Vec<&'static str> {
    SUPPORTED_PROFILES.iter().map(|p| p.id).collect()
}
