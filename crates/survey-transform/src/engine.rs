//! The recode engine.
//!
//! Each cell of a ruled variable goes through, in order:
//!
//! 1. pass-through of values that are already resolved (taxonomy markers and
//!    level labels), which makes recoding idempotent
//! 2. the custom value map
//! 3. the sentinel map (`missing` sentinels become nulls, every other
//!    category becomes its marker)
//! 4. the level map, or numeric coercion for numeric variables
//!
//! A code that fits none of these is a classification error. In strict mode
//! the stage stops; in permissive mode the cell becomes `No Response` and
//! the code is counted in the variable's report.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use survey_ingest::{column_names, column_values, replace_column};
use survey_model::{
    RecodeRule, ResponseCategory, VariableKind, format_numeric, normalize_code, parse_number,
    redact_value,
};

use crate::error::{RecodeError, Result};
use crate::rule_table::RuleTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecodeMode {
    /// Codes outside the rule abort the stage.
    Strict,
    /// Codes outside the rule are counted and marked `No Response`.
    #[default]
    Permissive,
}

/// A recoded cell and its taxonomy bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecodedCell {
    pub value: Option<String>,
    pub category: ResponseCategory,
}

impl RecodedCell {
    fn missing() -> Self {
        Self {
            value: None,
            category: ResponseCategory::Missing,
        }
    }

    fn category(category: ResponseCategory) -> Self {
        Self {
            value: category.marker().map(str::to_string),
            category,
        }
    }

    fn substantive(value: String) -> Self {
        Self {
            value: Some(value),
            category: ResponseCategory::Substantive,
        }
    }
}

fn resolved(rule: &RecodeRule, value: &str) -> Option<RecodedCell> {
    if let Some(category) = ResponseCategory::from_marker(value) {
        return Some(RecodedCell::category(category));
    }
    if let Some(levels) = &rule.levels
        && levels.is_label(value)
    {
        return Some(RecodedCell::substantive(value.to_string()));
    }
    None
}

/// Recode one cell. `None` means the value fits no declared code.
pub fn recode_cell(rule: &RecodeRule, raw: Option<&str>) -> Option<RecodedCell> {
    let Some(text) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Some(RecodedCell::missing());
    };
    if let Some(cell) = resolved(rule, text) {
        return Some(cell);
    }
    let mut code = normalize_code(text)?;
    if let Some(target) = rule.custom.get(&code) {
        code = target.clone();
    }
    if let Some(category) = rule.sentinel_category(&code) {
        return Some(RecodedCell::category(category));
    }
    if let Some(cell) = resolved(rule, &code) {
        return Some(cell);
    }
    match rule.kind {
        VariableKind::Numeric => {
            let number = parse_number(&code)?;
            if rule.range.is_some_and(|range| !range.contains(number)) {
                return None;
            }
            Some(RecodedCell::substantive(format_numeric(number)))
        }
        VariableKind::Categorical => match &rule.levels {
            Some(levels) => levels
                .label_for(&code)
                .map(|label| RecodedCell::substantive(label.to_string())),
            None => {
                if let Some(range) = rule.range {
                    let number = parse_number(&code)?;
                    if !range.contains(number) {
                        return None;
                    }
                }
                Some(RecodedCell::substantive(code))
            }
        },
    }
}

/// Taxonomy bucket of a cell under `rule`, without recoding it.
///
/// Codes outside the rule count as substantive here: they are only reclassified
/// once the engine has seen them.
pub fn classify_cell(rule: &RecodeRule, raw: Option<&str>) -> ResponseCategory {
    match recode_cell(rule, raw) {
        Some(cell) => cell.category,
        None => ResponseCategory::Substantive,
    }
}

/// Per-variable outcome of a recode pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableReport {
    pub variable: String,
    pub rows: usize,
    /// Output cells per taxonomy bucket.
    pub counts: BTreeMap<ResponseCategory, usize>,
    /// Codes outside the rule and how often each was seen.
    pub unclassified: BTreeMap<String, usize>,
    /// Cells whose text differs from the input.
    pub changed: usize,
    /// Whether the level order is meaningful; `None` for numeric variables.
    pub ordered: Option<bool>,
    /// Output labels in declared level order.
    pub levels: Vec<String>,
}

impl VariableReport {
    pub fn count(&self, category: ResponseCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn unclassified_total(&self) -> usize {
        self.unclassified.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecodeReport {
    pub mode: RecodeMode,
    pub variables: Vec<VariableReport>,
    /// Dataset columns with no rule, passed through unchanged.
    pub unrecoded: Vec<String>,
    /// Rules whose variable is absent from the dataset.
    pub absent: Vec<String>,
}

impl RecodeReport {
    pub fn variable(&self, name: &str) -> Option<&VariableReport> {
        self.variables.iter().find(|v| v.variable == name)
    }

    pub fn unclassified_total(&self) -> usize {
        self.variables
            .iter()
            .map(VariableReport::unclassified_total)
            .sum()
    }

    pub fn changed_total(&self) -> usize {
        self.variables.iter().map(|v| v.changed).sum()
    }
}

#[derive(Debug, Clone)]
pub struct RecodeOutcome {
    pub frame: DataFrame,
    pub report: RecodeReport,
}

#[derive(Debug, Clone)]
pub struct RecodeEngine<'a> {
    rules: &'a RuleTable,
    mode: RecodeMode,
}

impl<'a> RecodeEngine<'a> {
    pub fn new(rules: &'a RuleTable, mode: RecodeMode) -> Self {
        Self { rules, mode }
    }

    pub fn mode(&self) -> RecodeMode {
        self.mode
    }

    /// Recode one column under `rule`.
    pub fn recode_values(
        &self,
        rule: &RecodeRule,
        values: &[Option<String>],
    ) -> Result<(Vec<Option<String>>, VariableReport)> {
        let mut report = VariableReport {
            variable: rule.variable.clone(),
            rows: values.len(),
            ordered: rule.levels.as_ref().map(|levels| levels.ordered),
            levels: rule
                .levels
                .iter()
                .flat_map(|levels| levels.levels.iter().map(|level| level.label.clone()))
                .collect(),
            ..VariableReport::default()
        };
        let mut output = Vec::with_capacity(values.len());
        for (row, raw) in values.iter().enumerate() {
            let cell = match recode_cell(rule, raw.as_deref()) {
                Some(cell) => cell,
                None => {
                    let value = raw.as_deref().unwrap_or("").trim().to_string();
                    if self.mode == RecodeMode::Strict {
                        return Err(RecodeError::Classification {
                            variable: rule.variable.clone(),
                            value,
                            row: row + 1,
                        });
                    }
                    *report.unclassified.entry(value).or_insert(0) += 1;
                    RecodedCell::category(ResponseCategory::NoResponse)
                }
            };
            *report.counts.entry(cell.category).or_insert(0) += 1;
            if cell.value != *raw {
                report.changed += 1;
            }
            output.push(cell.value);
        }
        for (value, count) in &report.unclassified {
            warn!(
                variable = %rule.variable,
                value = redact_value(value),
                count,
                "code outside declared levels marked No Response"
            );
        }
        Ok((output, report))
    }

    /// Recode every ruled column of `df` into a new frame.
    pub fn recode(&self, df: &DataFrame) -> Result<RecodeOutcome> {
        let span = info_span!("recode", mode = ?self.mode, rules = self.rules.len());
        let _guard = span.enter();

        let columns = column_names(df);
        let mut frame = df.clone();
        let mut report = RecodeReport {
            mode: self.mode,
            ..RecodeReport::default()
        };
        for name in &columns {
            let Some(rule) = self.rules.get(name) else {
                warn!(variable = %name, "no recode rule, passing through unrecoded");
                report.unrecoded.push(name.clone());
                continue;
            };
            let values = column_values(df, name)?;
            let (recoded, variable_report) = self.recode_values(rule, &values)?;
            debug!(
                variable = %name,
                changed = variable_report.changed,
                unclassified = variable_report.unclassified_total(),
                "recoded variable"
            );
            replace_column(&mut frame, name, recoded)?;
            report.variables.push(variable_report);
        }
        for variable in self.rules.variables() {
            if !columns.iter().any(|c| c == variable) {
                warn!(variable, "rule variable not present in dataset, skipping");
                report.absent.push(variable.to_string());
            }
        }
        info!(
            recoded = report.variables.len(),
            unrecoded = report.unrecoded.len(),
            absent = report.absent.len(),
            changed = report.changed_total(),
            unclassified = report.unclassified_total(),
            "recode complete"
        );
        Ok(RecodeOutcome { frame, report })
    }
}

#[cfg(test)]
mod tests {
    use survey_model::LevelMap;

    use super::*;

    fn agreement_rule() -> RecodeRule {
        RecodeRule::categorical(
            "ST034Q01TA",
            LevelMap::new(true)
                .with_level("1", "Strongly agree")
                .with_level("2", "Agree")
                .with_level("3", "Disagree")
                .with_level("4", "Strongly disagree"),
        )
        .with_sentinel("95", ResponseCategory::ValidSkip)
        .with_sentinel("97", ResponseCategory::RandomSkip)
        .with_sentinel("98", ResponseCategory::Missing)
        .with_sentinel("99", ResponseCategory::NoResponse)
    }

    fn cell(rule: &RecodeRule, raw: &str) -> Option<RecodedCell> {
        recode_cell(rule, Some(raw))
    }

    #[test]
    fn levels_and_sentinels() {
        let rule = agreement_rule();
        assert_eq!(cell(&rule, "2").unwrap().value.as_deref(), Some("Agree"));
        assert_eq!(cell(&rule, "02.0").unwrap().value.as_deref(), Some("Agree"));
        let skip = cell(&rule, "97").unwrap();
        assert_eq!(skip.value.as_deref(), Some("Random Skip"));
        assert_eq!(skip.category, ResponseCategory::RandomSkip);
        assert_eq!(cell(&rule, "98").unwrap(), RecodedCell::missing());
        assert_eq!(recode_cell(&rule, None).unwrap(), RecodedCell::missing());
        assert!(cell(&rule, "6").is_none());
    }

    #[test]
    fn resolved_values_pass_through() {
        let rule = agreement_rule();
        assert_eq!(cell(&rule, "Agree").unwrap().value.as_deref(), Some("Agree"));
        assert_eq!(
            cell(&rule, "Valid Skip").unwrap().category,
            ResponseCategory::ValidSkip
        );
    }

    #[test]
    fn custom_map_runs_before_levels() {
        let rule = agreement_rule().with_custom("7", "1");
        assert_eq!(
            cell(&rule, "7").unwrap().value.as_deref(),
            Some("Strongly agree")
        );
    }

    #[test]
    fn numeric_variables_are_coerced() {
        let rule = RecodeRule::numeric("AGE")
            .with_range(15.0, 17.0)
            .with_sentinel("9999", ResponseCategory::NoResponse);
        assert_eq!(cell(&rule, "15.250").unwrap().value.as_deref(), Some("15.25"));
        assert_eq!(
            cell(&rule, "9999").unwrap().value.as_deref(),
            Some("No Response")
        );
        assert!(cell(&rule, "42").is_none());
        assert!(cell(&rule, "n/a").is_none());
    }

    #[test]
    fn strict_mode_stops_on_out_of_spec_code() {
        let table = RuleTable::from_rules([agreement_rule()]).unwrap();
        let engine = RecodeEngine::new(&table, RecodeMode::Strict);
        let values = vec![Some("1".to_string()), Some("6".to_string())];
        let err = engine.recode_values(&agreement_rule(), &values).unwrap_err();
        assert!(matches!(
            err,
            RecodeError::Classification { ref value, row: 2, .. } if value == "6"
        ));
    }

    #[test]
    fn permissive_mode_counts_out_of_spec_codes() {
        let table = RuleTable::from_rules([agreement_rule()]).unwrap();
        let engine = RecodeEngine::new(&table, RecodeMode::Permissive);
        let values = vec![Some("6".to_string()), Some("6".to_string()), None];
        let (output, report) = engine.recode_values(&agreement_rule(), &values).unwrap();
        assert_eq!(output[0].as_deref(), Some("No Response"));
        assert_eq!(report.unclassified.get("6"), Some(&2));
        assert_eq!(report.count(ResponseCategory::NoResponse), 2);
        assert_eq!(report.count(ResponseCategory::Missing), 1);
    }
}
