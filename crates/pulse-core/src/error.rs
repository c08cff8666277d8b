use std::path::PathBuf;
use thiserror::Error;

use crate::models::SourceType;

/// All errors produced by the stock-pulse crates.
///
/// Parsing never fails: malformed cells and quoting are coerced locally.
/// What surfaces here is the ingestion boundary and the store boundary.
#[derive(Error, Debug)]
pub enum PulseError {
    /// The uploaded file is not a CSV by name or content type.
    #[error("Invalid file type for {file_name}. Please upload a CSV.")]
    WrongFileType { file_name: String },

    /// Parsing succeeded but produced nothing worth storing.
    #[error("Parsed CSV contains no records for source {source_type}")]
    NoRecords { source_type: SourceType },

    /// The key/value store could not be read.
    #[error("Failed to read stored value {key}: {source}")]
    StoreRead {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The key/value store could not be written.
    #[error("Failed to write stored value {key}: {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// An import file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or produced.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A date string did not match `YYYY-MM-DD`.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the stock-pulse crates.
pub type Result<T> = std::result::Result<T, PulseError>;
