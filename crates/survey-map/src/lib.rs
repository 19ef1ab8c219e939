//! Variable mapping registry.
//!
//! - **registry**: resolve, status lookup and rule-based status updates
//! - **rename**: complete rename plans over a dataset's columns
//! - **exclusion**: data-driven exclusion rules and included-column selection

pub mod error;
pub mod exclusion;
pub mod registry;
pub mod rename;

pub use error::{RegistryError, Result};
pub use exclusion::{ExclusionCriterion, ExclusionRule, apply_exclusions, select_included};
pub use registry::{RegistryConflict, UpdateSummary, VariableRegistry};
pub use rename::{AbsentVariable, ColumnRename, RenamePlan};
