//! Variable mapping registry entries.
//!
//! One [`VariableMappingEntry`] per original variable code. The registry file
//! is a contract shared by several stages, so unknown columns are carried in
//! [`VariableMappingEntry::extra`] and written back untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Questionnaire the variable comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Student,
    School,
    Ict,
    #[default]
    Other,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::School => "school",
            Self::Ict => "ict",
            Self::Other => "other",
        }
    }

    /// Lenient parse; unrecognized sources fall back to `Other`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "student" | "stu" | "student questionnaire" => Self::Student,
            "school" | "sch" | "school questionnaire" => Self::School,
            "ict" | "ict questionnaire" | "ict familiarity" => Self::Ict,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusion decision for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VariableStatus {
    #[default]
    Included,
    Excluded,
}

impl VariableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Included => "Included",
            Self::Excluded => "Excluded",
        }
    }
}

impl fmt::Display for VariableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VariableStatus {
    type Err = ModelError;

    /// Empty status means the variable has not been excluded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "included" | "include" | "keep" => Ok(Self::Included),
            "excluded" | "exclude" | "drop" => Ok(Self::Excluded),
            _ => Err(ModelError::UnknownStatus(s.to_string())),
        }
    }
}

/// One row of the variable mapping registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariableMappingEntry {
    pub original_name: String,
    /// Target name; `None` when the registry leaves the variable unrenamed.
    pub renamed_name: Option<String>,
    pub description: String,
    pub data_source: DataSource,
    pub status: VariableStatus,
    pub status_priority: Option<String>,
    pub status_reason: Option<String>,
    pub pisa_domain: Option<String>,
    pub pisa_ict_school_domain: Option<String>,
    pub pisa_ict_home_domain: Option<String>,
    /// Remaining registry columns (cross-framework labels, analyst notes) in
    /// file order.
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

impl VariableMappingEntry {
    pub fn new(original_name: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            ..Self::default()
        }
    }

    pub fn with_rename(mut self, renamed: impl Into<String>) -> Self {
        self.renamed_name = Some(renamed.into());
        self
    }

    pub fn with_source(mut self, source: DataSource) -> Self {
        self.data_source = source;
        self
    }

    /// Renamed name after normalization, falling back to the original name.
    pub fn effective_name(&self) -> &str {
        self.renamed_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.original_name.trim())
    }

    pub fn is_included(&self) -> bool {
        self.status == VariableStatus::Included
    }
}

/// Answer to a status lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub status: VariableStatus,
    pub reason: Option<String>,
    pub priority: Option<String>,
}
