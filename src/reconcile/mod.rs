//! Reconciliation: the missing-tuple checker and batch deduplication.

pub mod checker;
pub mod dedup;

pub use checker::{
    DateReconciliation, MissingTuple, ReconciliationChecker, ReconciliationReport,
    ReconciliationStatus,
};
pub use dedup::dedup_records;
