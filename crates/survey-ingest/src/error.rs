//! Error types for survey artifact ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing artifacts.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Input file not found.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write file.
    #[error("failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === CSV Errors ===
    /// Malformed CSV content.
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV file has no header row.
    #[error("CSV file has no header: {path}")]
    EmptyCsv { path: PathBuf },

    /// Two columns share the same header.
    #[error("duplicate column '{column}' in {path}")]
    DuplicateColumn { column: String, path: PathBuf },

    // === Registry Errors ===
    /// Required registry column not found.
    #[error("required column '{column}' not found in {path}")]
    MissingColumn { column: String, path: PathBuf },

    /// Invalid value in a registry field.
    #[error("invalid {field} value '{value}' in {path} (line {line})")]
    InvalidValue {
        field: String,
        value: String,
        path: PathBuf,
        line: u64,
    },

    // === Frame Errors ===
    /// Column requested from a frame does not exist.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// Polars operation failed.
    #[error("dataframe error: {0}")]
    Frame(String),
}

impl From<polars::error::PolarsError> for IngestError {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::Frame(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
