use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source {source_id} unavailable: {message}")]
    SourceUnavailable { source_id: String, message: String },

    #[error("Unparseable date from {source_id}: {raw:?}")]
    UnparseableDate { source_id: String, raw: String },

    #[error("Invalid record from {source_id}: {reason}")]
    InvalidRecord { source_id: String, reason: String },

    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("Configuration missing for {source_id}: {what}")]
    ConfigurationMissing { source_id: String, what: String },

    #[error("No sources could be invoked: {0}")]
    NoSourcesAvailable(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl IngestError {
    /// Store failures that reject one record rather than the whole store.
    pub fn is_conflict(&self) -> bool {
        match self {
            IngestError::PersistenceConflict(_) => true,
            IngestError::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
