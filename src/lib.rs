pub mod apis;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod types;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub use error::{IngestError, Result};
pub use pipeline::{IngestionPipeline, IngestionSummary};
