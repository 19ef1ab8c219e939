//! Derived per-respondent quality flags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a quality check for one respondent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityFlag {
    #[serde(rename = "Flagged")]
    Flagged,
    #[serde(rename = "Not flagged")]
    NotFlagged,
}

impl QualityFlag {
    pub fn from_bool(flagged: bool) -> Self {
        if flagged { Self::Flagged } else { Self::NotFlagged }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flagged => "Flagged",
            Self::NotFlagged => "Not flagged",
        }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Flagged)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Flagged" => Some(Self::Flagged),
            "Not flagged" => Some(Self::NotFlagged),
            _ => None,
        }
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
