//! Error types for registry operations.

use thiserror::Error;

use survey_ingest::IngestError;

/// Errors from the variable mapping registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two registry rows share an original name.
    #[error("original variable '{0}' appears more than once in the registry")]
    DuplicateOriginal(String),

    /// Two registry rows or dataset columns would be renamed to the same name.
    #[error("'{first}' and '{second}' both resolve to '{renamed}'")]
    DuplicateRename {
        renamed: String,
        first: String,
        second: String,
    },

    /// Registry file or dataset I/O failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<polars::error::PolarsError> for RegistryError {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::Ingest(IngestError::from(error))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
