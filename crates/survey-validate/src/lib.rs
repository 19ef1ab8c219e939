//! Verification tallies and response-quality flags.
//!
//! - **tally**: per-variable taxonomy counts, before/after comparison and
//!   reconciliation
//! - **flags**: straight-lining blocks, event/duration consistency checks and
//!   the exactly-N-of-M aggregate

pub mod error;
pub mod flags;
pub mod tally;

pub use error::{Result, VerifyError};
pub use flags::{
    BlockPrecondition, ConsistencyCheck, FlagCount, FlagDetector, FlagOutcome, FlagSummary,
    ItemBlock, consistency_flag, flagged_histogram, straightline_flag,
};
pub use tally::{
    TallyComparison, TallySnapshot, VariableDelta, VariableTally,
    check_sentinel_elimination, compare,
};
