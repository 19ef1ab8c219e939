//! Error types for pipeline orchestration.

use std::path::PathBuf;

use thiserror::Error;

use survey_impute::ImputeError;
use survey_ingest::IngestError;
use survey_map::RegistryError;
use survey_transform::{RecodeError, RuleError};
use survey_validate::VerifyError;

/// Errors that stop a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// A stage's input artifact has not been produced yet.
    #[error("stage '{stage}' needs artifact '{artifact}' at {path}; run the previous stage first")]
    MissingArtifact {
        stage: String,
        artifact: String,
        path: PathBuf,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run journal {path} is unreadable: {message}")]
    Journal { path: PathBuf, message: String },

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Recode(#[from] RecodeError),

    #[error(transparent)]
    Impute(#[from] ImputeError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
