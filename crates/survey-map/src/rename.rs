//! Rename plans.
//!
//! A [`RenamePlan`] is the complete original to renamed function over one
//! dataset's columns. Columns the registry does not list keep their name.
//! Registry entries whose original column is absent from the dataset are
//! schema warnings: the registry may be broader than any single extract.

use std::collections::BTreeMap;

use polars::prelude::{Column, DataFrame};
use rapidfuzz::distance::jaro_winkler;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RegistryError, Result};
use crate::registry::VariableRegistry;

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRename {
    pub original: String,
    pub renamed: String,
}

impl ColumnRename {
    pub fn is_identity(&self) -> bool {
        self.original == self.renamed
    }
}

/// Registry variable missing from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsentVariable {
    pub original: String,
    /// Closest dataset column, when one is similar enough.
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    /// One entry per dataset column, in column order.
    pub renames: Vec<ColumnRename>,
    pub absent: Vec<AbsentVariable>,
}

impl RenamePlan {
    pub fn resolve(&self, original: &str) -> Option<&str> {
        self.renames
            .iter()
            .find(|r| r.original == original)
            .map(|r| r.renamed.as_str())
    }

    pub fn renamed_count(&self) -> usize {
        self.renames.iter().filter(|r| !r.is_identity()).count()
    }

    /// Produce a renamed copy of `df`. Column order and data are unchanged.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let lookup: BTreeMap<&str, &str> = self
            .renames
            .iter()
            .map(|r| (r.original.as_str(), r.renamed.as_str()))
            .collect();
        let columns: Vec<Column> = df
            .get_columns()
            .iter()
            .map(|column| {
                let name = column.name().as_str();
                let renamed = lookup.get(name).copied().unwrap_or(name);
                column.clone().with_name(renamed.into())
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

fn closest_column(name: &str, columns: &[String]) -> Option<String> {
    columns
        .iter()
        .map(|column| {
            let score = jaro_winkler::similarity(
                name.to_uppercase().chars(),
                column.to_uppercase().chars(),
            );
            (column, score)
        })
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(column, _)| column.clone())
}

impl VariableRegistry {
    /// Resolve every dataset column, rejecting two columns that land on one name.
    pub fn rename_plan(&self, columns: &[String]) -> Result<RenamePlan> {
        let mut plan = RenamePlan::default();
        let mut targets: BTreeMap<String, String> = BTreeMap::new();
        for column in columns {
            let renamed = self.resolve(column).to_string();
            if let Some(first) = targets.get(&renamed) {
                return Err(RegistryError::DuplicateRename {
                    renamed,
                    first: first.clone(),
                    second: column.clone(),
                });
            }
            if self.entry(column).is_none() {
                debug!(column = %column, "column not in registry, keeping name");
            }
            targets.insert(renamed.clone(), column.clone());
            plan.renames.push(ColumnRename {
                original: column.clone(),
                renamed,
            });
        }

        for entry in self.entries() {
            let original = entry.original_name.trim();
            if columns.iter().any(|c| c == original) {
                continue;
            }
            let suggestion = closest_column(original, columns);
            warn!(
                variable = original,
                suggestion = suggestion.as_deref().unwrap_or(""),
                "registry variable not present in dataset, skipping"
            );
            plan.absent.push(AbsentVariable {
                original: original.to_string(),
                suggestion,
            });
        }
        Ok(plan)
    }
}
