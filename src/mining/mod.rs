//! Mining valuation: the pure yield calculator and the difficulty schedule
//! the driver feeds it.

pub mod calculator;
pub mod difficulty;

pub use calculator::{estimate_yield, CalculatorError, YieldEstimate, BLOCK_SUBSIDY_BTC};
pub use difficulty::{DifficultyError, DifficultySchedule};
