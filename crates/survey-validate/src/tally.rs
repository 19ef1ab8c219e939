//! Taxonomy tallies.
//!
//! A [`TallySnapshot`] counts, per variable, the cells in each taxonomy bucket
//! plus the occurrences of watched literal sentinel codes. Snapshots are pure
//! reads of a dataset and can be taken after any stage.
//!
//! # Reconciliation
//!
//! For every scanned variable the buckets must sum to the row count, and the
//! counts an engine reports for its own output must match a fresh tally of
//! that output. Any mismatch is a [`VerifyError::Reconciliation`].

use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::debug;

use survey_ingest::{column_names, column_values};
use survey_model::{ResponseCategory, normalize_code};
use survey_transform::{RecodeReport, RuleTable, classify_cell};

use crate::error::{Result, VerifyError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableTally {
    pub variable: String,
    pub rows: usize,
    pub counts: BTreeMap<ResponseCategory, usize>,
    /// Watched literal codes still present, by code.
    pub sentinel_codes: BTreeMap<String, usize>,
}

impl VariableTally {
    pub fn count(&self, category: ResponseCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Cells outside the substantive bucket.
    pub fn non_substantive(&self) -> usize {
        self.total() - self.count(ResponseCategory::Substantive)
    }

    pub fn sentinel_count(&self, code: &str) -> usize {
        self.sentinel_codes.get(code).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TallySnapshot {
    pub stage: String,
    pub rows: usize,
    pub variables: Vec<VariableTally>,
}

impl TallySnapshot {
    /// Tally every column of `df`.
    ///
    /// With `rules`, ruled variables are classified as raw codes under their
    /// rule; everything else is read as recoded text (markers, labels, nulls).
    pub fn scan(
        stage: &str,
        df: &DataFrame,
        rules: Option<&RuleTable>,
        watched: &[String],
    ) -> Result<Self> {
        let watched: Vec<String> = watched
            .iter()
            .filter_map(|code| normalize_code(code))
            .collect();
        let mut variables = Vec::new();
        for name in column_names(df) {
            let rule = rules.and_then(|table| table.get(&name));
            let mut tally = VariableTally {
                variable: name.clone(),
                rows: df.height(),
                ..VariableTally::default()
            };
            for value in column_values(df, &name)? {
                let category = match rule {
                    Some(rule) => classify_cell(rule, value.as_deref()),
                    None => ResponseCategory::of_recoded(value.as_deref()),
                };
                *tally.counts.entry(category).or_insert(0) += 1;
                if let Some(code) = value.as_deref().and_then(normalize_code)
                    && watched.contains(&code)
                {
                    *tally.sentinel_codes.entry(code).or_insert(0) += 1;
                }
            }
            variables.push(tally);
        }
        debug!(stage, variables = variables.len(), rows = df.height(), "tally snapshot");
        Ok(Self {
            stage: stage.to_string(),
            rows: df.height(),
            variables,
        })
    }

    pub fn variable(&self, name: &str) -> Option<&VariableTally> {
        self.variables.iter().find(|v| v.variable == name)
    }

    pub fn category_total(&self, category: ResponseCategory) -> usize {
        self.variables.iter().map(|v| v.count(category)).sum()
    }

    /// Non-substantive cells over all variables.
    pub fn missing_total(&self) -> usize {
        self.variables.iter().map(VariableTally::non_substantive).sum()
    }

    pub fn total_cells(&self) -> usize {
        self.rows * self.variables.len()
    }

    /// Check that every variable's buckets partition its rows.
    pub fn reconcile(&self) -> Result<()> {
        for tally in &self.variables {
            if tally.total() != self.rows {
                return Err(VerifyError::Reconciliation {
                    stage: self.stage.clone(),
                    variable: tally.variable.clone(),
                    detail: format!("buckets sum to {} for {} rows", tally.total(), self.rows),
                });
            }
        }
        let cells: usize = ResponseCategory::ALL
            .iter()
            .map(|category| self.category_total(*category))
            .sum();
        if cells != self.total_cells() {
            return Err(VerifyError::Reconciliation {
                stage: self.stage.clone(),
                variable: "*".to_string(),
                detail: format!("{cells} classified cells, {} expected", self.total_cells()),
            });
        }
        Ok(())
    }

    /// Check the engine's own bucket counts against this tally of its output.
    pub fn reconcile_with(&self, report: &RecodeReport) -> Result<()> {
        for reported in &report.variables {
            let Some(tally) = self.variable(&reported.variable) else {
                return Err(VerifyError::Reconciliation {
                    stage: self.stage.clone(),
                    variable: reported.variable.clone(),
                    detail: "recoded variable missing from output".to_string(),
                });
            };
            for category in ResponseCategory::ALL {
                let expected = reported.count(category);
                let actual = tally.count(category);
                if expected != actual {
                    return Err(VerifyError::Reconciliation {
                        stage: self.stage.clone(),
                        variable: reported.variable.clone(),
                        detail: format!(
                            "engine reported {expected} {category} cells, output holds {actual}"
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Fail when any rule's own sentinel codes are still present in `df`.
///
/// Counts every sentinel key of every rule straight from the column values,
/// whether or not the code is on the watched list.
pub fn check_sentinel_elimination(df: &DataFrame, rules: &RuleTable) -> Result<()> {
    for name in column_names(df) {
        let Some(rule) = rules.get(&name) else {
            continue;
        };
        if rule.sentinels.is_empty() {
            continue;
        }
        let mut residual: BTreeMap<String, usize> = BTreeMap::new();
        for code in column_values(df, &name)?
            .iter()
            .filter_map(|value| value.as_deref().and_then(normalize_code))
        {
            if rule.sentinels.contains_key(&code) {
                *residual.entry(code).or_insert(0) += 1;
            }
        }
        if let Some((code, count)) = residual.into_iter().next() {
            return Err(VerifyError::ResidualSentinel {
                variable: name,
                code,
                count,
            });
        }
    }
    Ok(())
}

/// Before/after counts for one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDelta {
    pub variable: String,
    pub before: BTreeMap<ResponseCategory, usize>,
    pub after: BTreeMap<ResponseCategory, usize>,
    pub sentinels_before: BTreeMap<String, usize>,
    pub sentinels_after: BTreeMap<String, usize>,
}

impl VariableDelta {
    pub fn changed(&self) -> bool {
        self.before != self.after || self.sentinels_before != self.sentinels_after
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TallyComparison {
    pub before_stage: String,
    pub after_stage: String,
    pub variables: Vec<VariableDelta>,
}

impl TallyComparison {
    pub fn changed(&self) -> impl Iterator<Item = &VariableDelta> {
        self.variables.iter().filter(|v| v.changed())
    }
}

/// Pair variables by name. Variables present on one side only get an empty
/// count map on the other.
pub fn compare(before: &TallySnapshot, after: &TallySnapshot) -> TallyComparison {
    let mut names: Vec<&str> = before
        .variables
        .iter()
        .map(|v| v.variable.as_str())
        .collect();
    for tally in &after.variables {
        if !names.contains(&tally.variable.as_str()) {
            names.push(tally.variable.as_str());
        }
    }
    let variables = names
        .into_iter()
        .map(|name| {
            let b = before.variable(name);
            let a = after.variable(name);
            VariableDelta {
                variable: name.to_string(),
                before: b.map(|t| t.counts.clone()).unwrap_or_default(),
                after: a.map(|t| t.counts.clone()).unwrap_or_default(),
                sentinels_before: b.map(|t| t.sentinel_codes.clone()).unwrap_or_default(),
                sentinels_after: a.map(|t| t.sentinel_codes.clone()).unwrap_or_default(),
            }
        })
        .collect();
    TallyComparison {
        before_stage: before.stage.clone(),
        after_stage: after.stage.clone(),
        variables,
    }
}

#[cfg(test)]
mod tests {
    use survey_ingest::frame_from_columns;
    use survey_model::{LevelMap, RecodeRule};
    use survey_transform::{RecodeEngine, RecodeMode};

    use super::*;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    fn rules() -> RuleTable {
        RuleTable::from_rules([RecodeRule::categorical(
            "q",
            LevelMap::new(false).with_level("1", "Yes").with_level("2", "No"),
        )
        .with_sentinel("95", ResponseCategory::ValidSkip)
        .with_sentinel("97", ResponseCategory::RandomSkip)])
        .unwrap()
    }

    fn watched() -> Vec<String> {
        vec!["95".to_string(), "97".to_string(), "99".to_string()]
    }

    #[test]
    fn raw_and_recoded_tallies_agree_on_buckets() {
        let rules = rules();
        let raw = frame_from_columns(vec![("q".to_string(), cells(&["1", "95", "97", "", "2"]))])
            .unwrap();
        let before = TallySnapshot::scan("01_raw", &raw, Some(&rules), &watched()).unwrap();
        before.reconcile().unwrap();
        let q = before.variable("q").unwrap();
        assert_eq!(q.count(ResponseCategory::ValidSkip), 1);
        assert_eq!(q.sentinel_count("95"), 1);

        let outcome = RecodeEngine::new(&rules, RecodeMode::Strict)
            .recode(&raw)
            .unwrap();
        let after = TallySnapshot::scan("03_recoded", &outcome.frame, None, &watched()).unwrap();
        after.reconcile().unwrap();
        after.reconcile_with(&outcome.report).unwrap();
        check_sentinel_elimination(&outcome.frame, &rules).unwrap();
        assert_eq!(after.variable("q").unwrap().sentinel_count("95"), 0);

        let comparison = compare(&before, &after);
        assert_eq!(comparison.changed().count(), 1);
        assert_eq!(before.missing_total(), after.missing_total());
    }

    #[test]
    fn residual_sentinel_is_an_error() {
        let rules = rules();
        let df = frame_from_columns(vec![("q".to_string(), cells(&["Yes", "95"]))]).unwrap();
        let err = check_sentinel_elimination(&df, &rules).unwrap_err();
        assert!(matches!(err, VerifyError::ResidualSentinel { count: 1, .. }));
    }

    #[test]
    fn unwatched_rule_sentinel_is_still_caught() {
        let rules = RuleTable::from_rules([RecodeRule::categorical(
            "q",
            LevelMap::new(false).with_level("1", "Yes").with_level("2", "No"),
        )
        .with_sentinel("7", ResponseCategory::NoResponse)])
        .unwrap();
        let df = frame_from_columns(vec![("q".to_string(), cells(&["Yes", "7.0", "07"]))])
            .unwrap();
        let snapshot = TallySnapshot::scan("03_recoded", &df, None, &watched()).unwrap();
        assert_eq!(snapshot.variable("q").unwrap().sentinel_count("7"), 0);

        let err = check_sentinel_elimination(&df, &rules).unwrap_err();
        match err {
            VerifyError::ResidualSentinel {
                variable,
                code,
                count,
            } => {
                assert_eq!(variable, "q");
                assert_eq!(code, "7");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn engine_report_mismatch_is_fatal() {
        let rules = rules();
        let raw = frame_from_columns(vec![("q".to_string(), cells(&["1", "95"]))]).unwrap();
        let mut outcome = RecodeEngine::new(&rules, RecodeMode::Strict)
            .recode(&raw)
            .unwrap();
        outcome.report.variables[0]
            .counts
            .insert(ResponseCategory::Substantive, 2);
        let after = TallySnapshot::scan("03_recoded", &outcome.frame, None, &[]).unwrap();
        assert!(matches!(
            after.reconcile_with(&outcome.report),
            Err(VerifyError::Reconciliation { .. })
        ));
    }
}
