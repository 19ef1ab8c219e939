//! Recode engine and declarative rule tables.
//!
//! - **rule_table**: JSON rule tables with sentinel profiles and rule groups
//! - **checks**: per-rule structural validation
//! - **engine**: cell and dataset recoding under strict or permissive mode
//! - **review**: sentinel reuse review across the table

pub mod checks;
pub mod engine;
pub mod error;
pub mod review;
pub mod rule_table;

pub use checks::validate_rule;
pub use engine::{
    RecodeEngine, RecodeMode, RecodeOutcome, RecodeReport, RecodedCell, VariableReport,
    classify_cell, recode_cell,
};
pub use error::{RecodeError, Result, RuleError};
pub use review::{SentinelReuse, review_sentinel_reuse};
pub use rule_table::{RuleEntry, RuleTable, RuleTableFile};
