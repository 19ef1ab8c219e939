//! CLI library components for the survey recoding pipeline.

pub mod logging;
