//! Error types for imputation.

use thiserror::Error;

use survey_ingest::IngestError;

/// Reasons an imputation could not complete.
///
/// Every variant except `Ingest` is recovered per variable: the variable keeps
/// its original missingness and the failure is recorded in its audit entry.
#[derive(Debug, Error)]
pub enum ImputeError {
    #[error("variable '{0}' is not in the dataset")]
    MissingVariable(String),

    #[error("predictor '{predictor}' covers {coverage:.2} of rows, below the {threshold:.2} threshold")]
    InsufficientCoverage {
        predictor: String,
        coverage: f64,
        threshold: f64,
    },

    #[error("imputation model did not converge: {0}")]
    NotConverged(String),

    #[error("no observed values to impute from")]
    NoObserved,

    #[error("invalid imputation settings: {0}")]
    Config(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<polars::error::PolarsError> for ImputeError {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::Ingest(IngestError::from(error))
    }
}

pub type Result<T> = std::result::Result<T, ImputeError>;
