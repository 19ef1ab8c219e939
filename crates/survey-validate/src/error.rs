//! Error types for verification and quality flags.

use thiserror::Error;

use survey_ingest::IngestError;

#[derive(Debug, Error)]
pub enum VerifyError {
    /// Bucket counts disagree; always an engine defect.
    #[error("reconciliation failed for '{variable}' at {stage}: {detail}")]
    Reconciliation {
        stage: String,
        variable: String,
        detail: String,
    },

    /// A declared sentinel code survived recoding.
    #[error("'{variable}' still holds {count} raw '{code}' value(s) after recoding")]
    ResidualSentinel {
        variable: String,
        code: String,
        count: usize,
    },

    #[error("invalid quality flag configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<polars::error::PolarsError> for VerifyError {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::Ingest(IngestError::from(error))
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
