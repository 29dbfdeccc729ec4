//! Pipeline orchestration: ingestion and the ingest-derive-rollup-check loop.

pub mod ingest;
pub mod orchestrator;

pub use ingest::{IngestionError, IngestionResult, Ingestor};
pub use orchestrator::{GapFillOutcome, OrchestrationError, Orchestrator, ProcessOutcome};
