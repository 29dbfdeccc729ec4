//! Rollup maintenance: the three-level aggregate rebuilder and its verifier.

pub mod rebuilder;

pub use rebuilder::{AggregateInconsistency, AggregateRebuilder, RollupError};
