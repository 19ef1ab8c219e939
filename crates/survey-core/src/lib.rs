//! Pipeline orchestration for the survey recoding workflow.
//!
//! - **config**: `survey.toml` project configuration
//! - **artifacts**: ordinal-named stage artifacts with atomic writes
//! - **journal**: append-only run journal with artifact digests
//! - **pipeline**: the stages and registry/rule maintenance operations

pub mod artifacts;
pub mod config;
pub mod error;
pub mod journal;
pub mod pipeline;

pub use artifacts::{ArtifactInfo, ArtifactStore, Stage, file_sha256};
pub use config::{CONFIG_FILE, ProjectConfig, RecodeSection, RuleNames, VerifySection};
pub use error::{PipelineError, Result};
pub use journal::{JOURNAL_FILE, Journal, JournalEntry};
pub use pipeline::{
    ExclusionOutcome, FlagAudit, ImputeAudit, IngestAudit, Pipeline, RecodeAudit, RenameAudit,
    RulesCheck, RunSummary, StageOutcome,
};
