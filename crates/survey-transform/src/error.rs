//! Error types for rule tables and recoding.

use std::path::PathBuf;

use thiserror::Error;

use survey_ingest::IngestError;

/// Errors raised while loading or validating a rule table.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rule table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule table: {0}")]
    Parse(String),

    /// A variable is covered by more than one rule.
    #[error("variable '{variable}' has more than one recode rule")]
    DuplicateRule { variable: String },

    #[error("rule for '{variable}' references unknown sentinel profile '{profile}'")]
    UnknownProfile { variable: String, profile: String },

    #[error("rule for '{variable}' references unknown scale '{scale}'")]
    UnknownScale { variable: String, scale: String },

    /// A label or code could be mistaken for another value on a second pass.
    #[error("rule for '{variable}': '{value}' {detail}")]
    CodeCollision {
        variable: String,
        value: String,
        detail: &'static str,
    },

    /// A custom map target is itself a custom map source.
    #[error("rule for '{variable}': custom value '{code}' is both a source and a target")]
    ChainedCustom { variable: String, code: String },

    /// A level code is also declared as a sentinel.
    #[error("rule for '{variable}': code '{code}' is both a level and a sentinel")]
    SentinelLevel { variable: String, code: String },

    #[error("invalid rule for '{variable}': {message}")]
    Invalid { variable: String, message: String },
}

/// Errors raised while recoding a dataset.
#[derive(Debug, Error)]
pub enum RecodeError {
    /// A raw code fits neither the sentinel map nor the declared level set.
    #[error("variable '{variable}' row {row}: value '{value}' is outside the declared codes")]
    Classification {
        variable: String,
        value: String,
        row: usize,
    },

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<polars::error::PolarsError> for RecodeError {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::Ingest(IngestError::from(error))
    }
}

pub type Result<T> = std::result::Result<T, RecodeError>;
