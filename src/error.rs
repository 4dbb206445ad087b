// Error type shared by every pipeline stage.
use std::path::PathBuf;
use thiserror::Error;

/// Failure of one pipeline invocation. None of these are retried internally.
#[derive(Error, Debug)]
pub enum CalorieError {
    #[error("Data source {path:?} is missing or unreadable: {source}")]
    DataUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("Model has not been fitted; call fit before predict")]
    NotFitted,
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Metric computation failed: {0}")]
    Metric(#[from] linfa::Error),
}

pub type Result<T> = std::result::Result<T, CalorieError>;
