//! Imputation of designated survey variables.
//!
//! Three methods are available per target: predictive mean matching over a
//! fixed predictor set, mode resolution, and a rule-based conditional fill.
//! Each run yields an [`ImputationRecord`](survey_model::ImputationRecord)
//! listing every changed cell and every cell left unresolved.

pub mod conditional;
pub mod error;
pub mod imputer;
pub mod mode;
pub mod pmm;
pub mod settings;

pub use error::{ImputeError, Result};
pub use imputer::{ImputationRun, ImputedColumn, Imputer};
pub use mode::resolve_mode;
pub use settings::{ConditionalSettings, ImputationMethod, ImputationSpec, PmmSettings};
