pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod error;
pub mod mining;
pub mod orchestration;
pub mod reconcile;
pub mod rollup;

pub use config::Config;
pub use datasource::{CurtailmentSource, DataSourceError, ElexonSource, MockCurtailmentSource};
pub use db::{init_db, Repository};
pub use domain::{
    CurtailmentRecord, Decimal, FarmId, HardwareProfile, MiningYieldRecord, SettlementPeriod,
};
pub use error::AppError;
pub use mining::{estimate_yield, DifficultySchedule, YieldEstimate};
pub use reconcile::{dedup_records, ReconciliationChecker};
pub use rollup::AggregateRebuilder;
