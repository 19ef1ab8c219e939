//! Declarative per-variable recode rules.
//!
//! A [`RecodeRule`] carries everything the recode engine needs to turn one raw
//! column into its labeled form:
//!
//! - `sentinels`: raw code -> taxonomy category (strictly per variable)
//! - `levels`: substantive code -> label, optionally ordered
//! - `custom`: one-off code substitutions applied before everything else
//! - `range`: accepted substantive range for numeric variables

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::code::{normalize_code, parse_number};
use crate::error::ModelError;
use crate::taxonomy::ResponseCategory;

/// How substantive values of a variable are represented after recoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Codes are replaced by labels from the level map.
    #[default]
    Categorical,
    /// Codes are coerced to numbers; no level map.
    Numeric,
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categorical => "categorical",
            Self::Numeric => "numeric",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VariableKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "categorical" | "factor" | "ordinal" => Ok(Self::Categorical),
            "numeric" | "number" | "continuous" => Ok(Self::Numeric),
            _ => Err(ModelError::UnknownKind(s.to_string())),
        }
    }
}

/// One substantive code and its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub code: String,
    pub label: String,
}

/// Ordered list of levels for a categorical variable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LevelMap {
    /// Whether the level order carries meaning (ordinal scale).
    #[serde(default)]
    pub ordered: bool,
    pub levels: Vec<Level>,
}

impl LevelMap {
    pub fn new(ordered: bool) -> Self {
        Self {
            ordered,
            levels: Vec::new(),
        }
    }

    /// Append a level; codes are normalized before storage.
    pub fn with_level(mut self, code: &str, label: impl Into<String>) -> Self {
        let code = normalize_code(code).unwrap_or_else(|| code.to_string());
        self.levels.push(Level {
            code,
            label: label.into(),
        });
        self
    }

    pub fn label_for(&self, code: &str) -> Option<&str> {
        self.levels
            .iter()
            .find(|level| level.code == code)
            .map(|level| level.label.as_str())
    }

    pub fn code_for_label(&self, label: &str) -> Option<&str> {
        self.levels
            .iter()
            .find(|level| level.label == label)
            .map(|level| level.code.as_str())
    }

    pub fn is_label(&self, value: &str) -> bool {
        self.levels.iter().any(|level| level.label == value)
    }

    /// Zero-based position of a label in declaration order.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.label == label)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Inclusive range of valid substantive values for a numeric variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodeRange {
    pub min: f64,
    pub max: f64,
}

impl CodeRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Complete recode rule for one variable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecodeRule {
    pub variable: String,
    #[serde(default)]
    pub kind: VariableKind,
    /// Normalized raw code -> category. Never contains `Substantive`.
    #[serde(default)]
    pub sentinels: BTreeMap<String, ResponseCategory>,
    #[serde(default)]
    pub levels: Option<LevelMap>,
    /// Normalized raw code -> replacement code.
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
    #[serde(default)]
    pub range: Option<CodeRange>,
}

impl RecodeRule {
    pub fn categorical(variable: impl Into<String>, levels: LevelMap) -> Self {
        Self {
            variable: variable.into(),
            kind: VariableKind::Categorical,
            levels: Some(levels),
            ..Self::default()
        }
    }

    pub fn numeric(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            kind: VariableKind::Numeric,
            ..Self::default()
        }
    }

    /// Declare a sentinel code for this variable.
    pub fn with_sentinel(mut self, code: &str, category: ResponseCategory) -> Self {
        let code = normalize_code(code).unwrap_or_else(|| code.to_string());
        self.sentinels.insert(code, category);
        self
    }

    /// Declare a custom substitution applied before sentinel/level lookup.
    pub fn with_custom(mut self, from: &str, to: &str) -> Self {
        let from = normalize_code(from).unwrap_or_else(|| from.to_string());
        let to = normalize_code(to).unwrap_or_else(|| to.to_string());
        self.custom.insert(from, to);
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(CodeRange { min, max });
        self
    }

    pub fn sentinel_category(&self, code: &str) -> Option<ResponseCategory> {
        self.sentinels.get(code).copied()
    }

    /// Numeric representation used by models: the code itself when numeric,
    /// otherwise the level position.
    pub fn coded_value(&self, recoded: &str) -> Option<f64> {
        match self.kind {
            VariableKind::Numeric => parse_number(recoded),
            VariableKind::Categorical => {
                let levels = self.levels.as_ref()?;
                let code = levels.code_for_label(recoded)?;
                parse_number(code).or_else(|| levels.position(recoded).map(|p| p as f64 + 1.0))
            }
        }
    }
}
