//! Data-driven exclusion rules.
//!
//! Rules are evaluated in declared order against a dataset and applied through
//! [`VariableRegistry::bulk_update`], so a later rule overrides an earlier one
//! and the override is recorded as a conflict.

use std::collections::{BTreeSet, HashSet};

use polars::prelude::{Column, DataFrame};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use survey_ingest::{column_names, column_values};
use survey_model::{ResponseCategory, VariableStatus};

use crate::error::Result;
use crate::registry::{UpdateSummary, VariableRegistry};

/// What a rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionCriterion {
    /// At most one distinct substantive value.
    Constant,
    /// No substantive value at all.
    AllNonSubstantive,
    /// Cell-for-cell identical to an earlier column.
    Duplicate,
    /// An explicit list of variables.
    Names { names: Vec<String> },
}

impl ExclusionCriterion {
    fn default_reason(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::AllNonSubstantive => "no substantive responses",
            Self::Duplicate => "duplicate column",
            Self::Names { .. } => "listed",
        }
    }

    /// Dataset columns matched by this criterion.
    pub fn matching_columns(&self, df: &DataFrame) -> Result<BTreeSet<String>> {
        let mut matched = BTreeSet::new();
        match self {
            Self::Constant | Self::AllNonSubstantive => {
                for name in column_names(df) {
                    let distinct: HashSet<String> = column_values(df, &name)?
                        .into_iter()
                        .flatten()
                        .filter(|value| {
                            ResponseCategory::of_recoded(Some(value.as_str())).is_administered()
                        })
                        .collect();
                    let hit = match self {
                        Self::Constant => distinct.len() <= 1,
                        _ => distinct.is_empty(),
                    };
                    if hit {
                        matched.insert(name);
                    }
                }
            }
            Self::Duplicate => {
                let mut seen: Vec<Vec<Option<String>>> = Vec::new();
                for name in column_names(df) {
                    let values = column_values(df, &name)?;
                    if seen.contains(&values) {
                        matched.insert(name);
                    } else {
                        seen.push(values);
                    }
                }
            }
            Self::Names { names } => {
                matched.extend(names.iter().map(|n| n.trim().to_string()));
            }
        }
        Ok(matched)
    }
}

fn default_status() -> VariableStatus {
    VariableStatus::Excluded
}

/// A named status rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub name: String,
    #[serde(flatten)]
    pub criterion: ExclusionCriterion,
    #[serde(default = "default_status")]
    pub status: VariableStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ExclusionRule {
    pub fn new(name: impl Into<String>, criterion: ExclusionCriterion) -> Self {
        Self {
            name: name.into(),
            criterion,
            status: VariableStatus::Excluded,
            reason: None,
        }
    }

    pub fn with_status(mut self, status: VariableStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .unwrap_or_else(|| self.criterion.default_reason())
    }
}

/// Evaluate `rules` in order against `df` and update the registry.
///
/// Matched columns the registry does not list cannot carry a status and are
/// skipped with a warning.
pub fn apply_exclusions(
    registry: &mut VariableRegistry,
    rules: &[ExclusionRule],
    df: &DataFrame,
) -> Result<Vec<UpdateSummary>> {
    let mut summaries = Vec::with_capacity(rules.len());
    for rule in rules {
        let matched = rule.criterion.matching_columns(df)?;
        for name in &matched {
            if registry.entry_by_name(name).is_none() {
                warn!(rule = %rule.name, variable = %name, "matched variable not in registry");
            }
        }
        let summary = registry.bulk_update(
            &rule.name,
            |entry| {
                matched.contains(entry.effective_name())
                    || matched.contains(entry.original_name.trim())
            },
            rule.status,
            Some(rule.reason()),
        );
        info!(
            rule = %rule.name,
            status = %rule.status,
            matched = summary.matched,
            changed = summary.changed,
            "applied exclusion rule"
        );
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Drop every column the registry marks as excluded.
pub fn select_included(
    registry: &VariableRegistry,
    df: &DataFrame,
) -> Result<(DataFrame, Vec<String>)> {
    let mut dropped = Vec::new();
    let kept: Vec<Column> = df
        .get_columns()
        .iter()
        .filter(|column| {
            let name = column.name().as_str();
            let included = registry.is_included(name);
            if !included {
                dropped.push(name.to_string());
            }
            included
        })
        .cloned()
        .collect();
    if !dropped.is_empty() {
        info!(dropped = dropped.len(), "dropped excluded variables");
    }
    Ok((DataFrame::new(kept)?, dropped))
}
