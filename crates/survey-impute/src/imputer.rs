//! Imputation over a dataset.

use polars::prelude::DataFrame;
use tracing::{debug, info, info_span, warn};

use survey_ingest::{column_values, has_column, record_ids, replace_column};
use survey_model::{
    ImputationOutcome, ImputationRecord, RecodeRule, ResponseCategory, parse_number,
    redact_value,
};
use survey_transform::RuleTable;

use crate::conditional::{check_settings, rule_applies};
use crate::error::{ImputeError, Result};
use crate::mode::resolve_mode;
use crate::pmm::{PmmInput, match_donors};
use crate::settings::{ImputationMethod, ImputationSpec};

/// Completed column and its audit entry.
#[derive(Debug, Clone)]
pub struct ImputedColumn {
    pub values: Vec<Option<String>>,
    pub record: ImputationRecord,
}

/// A dataset after all declared imputations.
#[derive(Debug, Clone)]
pub struct ImputationRun {
    pub frame: DataFrame,
    pub records: Vec<ImputationRecord>,
}

impl ImputationRun {
    pub fn failed(&self) -> impl Iterator<Item = &ImputationRecord> {
        self.records.iter().filter(|r| !r.outcome.is_completed())
    }
}

/// Numeric code of a recoded cell, if it is substantive.
fn coded(rule: Option<&RecodeRule>, value: Option<&str>) -> Option<f64> {
    let value = value?;
    if !ResponseCategory::of_recoded(Some(value)).is_administered() {
        return None;
    }
    match rule {
        Some(rule) => rule.coded_value(value).or_else(|| parse_number(value)),
        None => parse_number(value),
    }
}

pub struct Imputer<'a> {
    rules: &'a RuleTable,
    id_column: Option<&'a str>,
}

impl<'a> Imputer<'a> {
    pub fn new(rules: &'a RuleTable, id_column: Option<&'a str>) -> Self {
        Self { rules, id_column }
    }

    fn column(&self, df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
        if !has_column(df, name) {
            return Err(ImputeError::MissingVariable(name.to_string()));
        }
        Ok(column_values(df, name)?)
    }

    fn coded_column(&self, df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
        let rule = self.rules.get(name);
        Ok(self
            .column(df, name)?
            .iter()
            .map(|value| coded(rule, value.as_deref()))
            .collect())
    }

    /// Fill values for `fill_rows`; rows the method cannot resolve are left out.
    fn fills(
        &self,
        df: &DataFrame,
        spec: &ImputationSpec,
        values: &[Option<String>],
        fill_rows: &[usize],
    ) -> Result<Vec<(usize, String)>> {
        match &spec.method {
            ImputationMethod::Mode => {
                let mode = resolve_mode(values, self.rules.get(&spec.target))
                    .ok_or(ImputeError::NoObserved)?;
                Ok(fill_rows.iter().map(|row| (*row, mode.clone())).collect())
            }
            ImputationMethod::PredictiveMeanMatching(settings) => {
                let target = self.coded_column(df, &spec.target)?;
                let mut predictors = Vec::with_capacity(settings.predictors.len());
                for name in &settings.predictors {
                    predictors.push((name.clone(), self.coded_column(df, name)?));
                }
                let input = PmmInput {
                    target: &target,
                    predictors: &predictors,
                    fill_rows,
                };
                let matches = match_donors(&input, settings)?;
                Ok(matches
                    .donors
                    .into_iter()
                    .filter_map(|(row, donor)| values[donor].clone().map(|value| (row, value)))
                    .collect())
            }
            ImputationMethod::Conditional(settings) => {
                check_settings(settings)?;
                let mut items = Vec::with_capacity(settings.items.len());
                for name in &settings.items {
                    items.push(self.column(df, name)?);
                }
                Ok(fill_rows
                    .iter()
                    .filter(|row| {
                        let row_items: Vec<Option<&str>> =
                            items.iter().map(|item| item[**row].as_deref()).collect();
                        rule_applies(settings, &row_items)
                    })
                    .map(|row| (*row, settings.value.clone()))
                    .collect())
            }
        }
    }

    /// Impute one target. Only cells in the spec's fill categories change.
    pub fn impute(&self, df: &DataFrame, spec: &ImputationSpec) -> Result<ImputedColumn> {
        let values = self.column(df, &spec.target)?;
        let ids = record_ids(df, self.id_column);
        let fill_rows: Vec<usize> = (0..values.len())
            .filter(|row| spec.fills(values[*row].as_deref()))
            .collect();

        let mut record = ImputationRecord::new(&spec.target, spec.method.name());
        record.predictor_set = spec.method.predictors();
        let mut output = values.clone();
        let fills = if fill_rows.is_empty() {
            Vec::new()
        } else {
            self.fills(df, spec, &values, &fill_rows)?
        };
        for (row, value) in fills {
            debug!(
                variable = %spec.target,
                record = %ids[row],
                value = redact_value(&value),
                "imputed cell"
            );
            record.push_change(&ids[row], values[row].clone(), value.clone());
            output[row] = Some(value);
        }
        record.unresolved_record_ids = fill_rows
            .iter()
            .filter(|row| output[**row] == values[**row])
            .map(|row| ids[*row].clone())
            .collect();
        Ok(ImputedColumn {
            values: output,
            record,
        })
    }

    /// Run every spec in order. A failing spec leaves its variable untouched
    /// and is recorded as failed; only I/O and frame errors abort the run.
    pub fn impute_all(&self, df: &DataFrame, specs: &[ImputationSpec]) -> Result<ImputationRun> {
        let mut frame = df.clone();
        let mut records = Vec::with_capacity(specs.len());
        for spec in specs {
            let span = info_span!("impute", variable = %spec.target, method = spec.method.name());
            let _guard = span.enter();
            match self.impute(&frame, spec) {
                Ok(imputed) => {
                    info!(
                        changed = imputed.record.changed_count(),
                        unresolved = imputed.record.unresolved_record_ids.len(),
                        "imputation complete"
                    );
                    replace_column(&mut frame, &spec.target, imputed.values)?;
                    records.push(imputed.record);
                }
                Err(ImputeError::Ingest(error)) => return Err(ImputeError::Ingest(error)),
                Err(error) => {
                    warn!(error = %error, "imputation failed, keeping original missingness");
                    let mut record = ImputationRecord::new(&spec.target, spec.method.name());
                    record.predictor_set = spec.method.predictors();
                    if has_column(&frame, &spec.target) {
                        let values = column_values(&frame, &spec.target)?;
                        let ids = record_ids(&frame, self.id_column);
                        record.unresolved_record_ids = (0..values.len())
                            .filter(|row| spec.fills(values[*row].as_deref()))
                            .map(|row| ids[row].clone())
                            .collect();
                    }
                    record.outcome = ImputationOutcome::Failed {
                        reason: error.to_string(),
                    };
                    records.push(record);
                }
            }
        }
        Ok(ImputationRun { frame, records })
    }
}
