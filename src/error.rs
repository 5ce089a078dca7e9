//! Error types for Lapflux

use thiserror::Error;

/// Errors that can occur while parsing tables or loading configuration.
///
/// Missing data inside a well-formed table is never an error: derivations
/// degrade to empty collections or zero-valued metrics instead.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse table: {0}")]
    ParseError(String),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty upload: {0}")]
    EmptyUpload(String),
}
