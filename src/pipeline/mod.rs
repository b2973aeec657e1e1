// Data processing pipeline: ingestion, processing, and storage

pub mod ingestion;
pub mod processing;
pub mod run_context;
pub mod runner;
pub mod storage;

pub use runner::{default_years, IngestionPipeline, IngestionSummary, RefreshSummary};
