//! Response-quality flags.
//!
//! Flags are derived columns appended to the dataset; source variables are
//! never modified. Every flag is recomputed from recoded values, so re-running
//! the detector on its own output yields the same flags.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use survey_ingest::{column_values, has_column, replace_column};
use survey_model::{QualityFlag, ResponseCategory, parse_number};

use crate::error::{Result, VerifyError};

fn default_min_answered() -> usize {
    1
}

fn default_no_values() -> Vec<String> {
    vec!["No".to_string()]
}

/// Flag only when at least one of `items` holds one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPrecondition {
    pub items: Vec<String>,
    pub values: Vec<String>,
}

/// A named block of related items checked for straight-lining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBlock {
    pub name: String,
    pub items: Vec<String>,
    #[serde(default)]
    pub precondition: Option<BlockPrecondition>,
    /// Minimum substantive answers before a block can be flagged.
    #[serde(default = "default_min_answered")]
    pub min_answered: usize,
    #[serde(default)]
    pub flag_column: Option<String>,
}

impl ItemBlock {
    pub fn new(name: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            name: name.into(),
            items,
            precondition: None,
            min_answered: default_min_answered(),
            flag_column: None,
        }
    }

    pub fn with_precondition(mut self, items: Vec<String>, values: Vec<String>) -> Self {
        self.precondition = Some(BlockPrecondition { items, values });
        self
    }

    pub fn column_name(&self) -> String {
        self.flag_column
            .clone()
            .unwrap_or_else(|| format!("flag_{}", self.name))
    }
}

/// Agreement between an event item and a paired duration or count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub name: String,
    pub event: String,
    pub duration: String,
    /// Event values meaning "did not happen".
    #[serde(default = "default_no_values")]
    pub no_values: Vec<String>,
    #[serde(default)]
    pub flag_column: Option<String>,
}

impl ConsistencyCheck {
    pub fn new(
        name: impl Into<String>,
        event: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            event: event.into(),
            duration: duration.into(),
            no_values: default_no_values(),
            flag_column: None,
        }
    }

    pub fn column_name(&self) -> String {
        self.flag_column
            .clone()
            .unwrap_or_else(|| format!("flag_{}", self.name))
    }
}

fn substantive(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    ResponseCategory::of_recoded(Some(value))
        .is_administered()
        .then_some(value)
}

/// Straight-lining for one respondent's block values.
pub fn straightline_flag(
    block: &ItemBlock,
    values: &[Option<&str>],
    precondition_values: &[Option<&str>],
) -> QualityFlag {
    if let Some(precondition) = &block.precondition {
        let triggered = precondition_values.iter().any(|value| {
            substantive(*value).is_some_and(|v| precondition.values.iter().any(|p| p == v))
        });
        if !triggered {
            return QualityFlag::NotFlagged;
        }
    }
    let answered: Vec<&str> = values.iter().filter_map(|v| substantive(*v)).collect();
    let uniform = answered.windows(2).all(|pair| pair[0] == pair[1]);
    QualityFlag::from_bool(answered.len() >= block.min_answered.max(1) && uniform)
}

/// Event/duration mismatch for one respondent.
///
/// Non-substantive or non-numeric inputs never flag.
pub fn consistency_flag(
    check: &ConsistencyCheck,
    event: Option<&str>,
    duration: Option<&str>,
) -> QualityFlag {
    let (Some(event), Some(duration)) = (substantive(event), substantive(duration)) else {
        return QualityFlag::NotFlagged;
    };
    let Some(duration) = parse_number(duration) else {
        return QualityFlag::NotFlagged;
    };
    let said_no = check.no_values.iter().any(|no| no.trim() == event);
    QualityFlag::from_bool(if said_no {
        duration != 0.0
    } else {
        duration == 0.0
    })
}

/// Flag counts for one block or check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagCount {
    pub name: String,
    pub column: String,
    pub flagged: usize,
    pub not_flagged: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagSummary {
    pub flags: Vec<FlagCount>,
    /// Respondents by number of flags raised.
    pub histogram: BTreeMap<usize, usize>,
}

impl FlagSummary {
    /// Respondents flagged in exactly `n` of the computed flags.
    pub fn count_flagged_exactly(&self, n: usize) -> usize {
        self.histogram.get(&n).copied().unwrap_or(0)
    }

    pub fn flag_total(&self) -> usize {
        self.flags.len()
    }
}

/// Histogram of flags raised per respondent over several flag columns.
pub fn flagged_histogram(rows: usize, columns: &[Vec<QualityFlag>]) -> BTreeMap<usize, usize> {
    let mut histogram = BTreeMap::new();
    for row in 0..rows {
        let raised = columns
            .iter()
            .filter(|column| column.get(row).is_some_and(|flag| flag.is_flagged()))
            .count();
        *histogram.entry(raised).or_insert(0) += 1;
    }
    histogram
}

#[derive(Debug, Clone)]
pub struct FlagOutcome {
    pub frame: DataFrame,
    pub summary: FlagSummary,
}

#[derive(Debug, Clone, Default)]
pub struct FlagDetector {
    blocks: Vec<ItemBlock>,
    checks: Vec<ConsistencyCheck>,
}

fn present_items(df: &DataFrame, owner: &str, items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|item| {
            let present = has_column(df, item);
            if !present {
                warn!(flag = owner, variable = %item, "flag item not present in dataset, skipping");
            }
            present
        })
        .cloned()
        .collect()
}

fn read_columns(df: &DataFrame, names: &[String]) -> Result<Vec<Vec<Option<String>>>> {
    names
        .iter()
        .map(|name| column_values(df, name).map_err(VerifyError::from))
        .collect()
}

impl FlagDetector {
    pub fn new(blocks: Vec<ItemBlock>, checks: Vec<ConsistencyCheck>) -> Result<Self> {
        let mut columns = Vec::new();
        for block in &blocks {
            let column = block.column_name();
            if block.items.contains(&column) {
                return Err(VerifyError::Config(format!(
                    "flag column '{column}' overwrites an item of block '{}'",
                    block.name
                )));
            }
            columns.push(column);
        }
        for check in &checks {
            let column = check.column_name();
            if column == check.event || column == check.duration {
                return Err(VerifyError::Config(format!(
                    "flag column '{column}' overwrites an input of check '{}'",
                    check.name
                )));
            }
            columns.push(column);
        }
        let mut sorted = columns.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != columns.len() {
            return Err(VerifyError::Config(
                "two flags share one output column".to_string(),
            ));
        }
        Ok(Self { blocks, checks })
    }

    fn block_flags(&self, df: &DataFrame, block: &ItemBlock) -> Result<Option<Vec<QualityFlag>>> {
        let items = present_items(df, &block.name, &block.items);
        if items.is_empty() {
            warn!(flag = %block.name, "no block items present, block skipped");
            return Ok(None);
        }
        let values = read_columns(df, &items)?;
        let trigger = match &block.precondition {
            Some(precondition) => {
                read_columns(df, &present_items(df, &block.name, &precondition.items))?
            }
            None => Vec::new(),
        };
        let flags = (0..df.height())
            .map(|row| {
                let row_values: Vec<Option<&str>> =
                    values.iter().map(|column| column[row].as_deref()).collect();
                let row_trigger: Vec<Option<&str>> =
                    trigger.iter().map(|column| column[row].as_deref()).collect();
                straightline_flag(block, &row_values, &row_trigger)
            })
            .collect();
        Ok(Some(flags))
    }

    fn check_flags(
        &self,
        df: &DataFrame,
        check: &ConsistencyCheck,
    ) -> Result<Option<Vec<QualityFlag>>> {
        let inputs = [check.event.clone(), check.duration.clone()];
        if present_items(df, &check.name, &inputs).len() != inputs.len() {
            warn!(flag = %check.name, "consistency inputs missing, check skipped");
            return Ok(None);
        }
        let event = column_values(df, &check.event)?;
        let duration = column_values(df, &check.duration)?;
        Ok(Some(
            event
                .iter()
                .zip(&duration)
                .map(|(e, d)| consistency_flag(check, e.as_deref(), d.as_deref()))
                .collect(),
        ))
    }

    /// Append one flag column per block and check.
    pub fn detect(&self, df: &DataFrame) -> Result<FlagOutcome> {
        let span = info_span!("flags", blocks = self.blocks.len(), checks = self.checks.len());
        let _guard = span.enter();

        let mut computed: Vec<(String, String, Vec<QualityFlag>)> = Vec::new();
        for block in &self.blocks {
            if let Some(flags) = self.block_flags(df, block)? {
                computed.push((block.name.clone(), block.column_name(), flags));
            }
        }
        for check in &self.checks {
            if let Some(flags) = self.check_flags(df, check)? {
                computed.push((check.name.clone(), check.column_name(), flags));
            }
        }

        let mut frame = df.clone();
        let mut summary = FlagSummary::default();
        for (name, column, flags) in &computed {
            let flagged = flags.iter().filter(|f| f.is_flagged()).count();
            info!(flag = %name, flagged, rows = flags.len(), "quality flag computed");
            summary.flags.push(FlagCount {
                name: name.clone(),
                column: column.clone(),
                flagged,
                not_flagged: flags.len() - flagged,
            });
            let values = flags.iter().map(|f| Some(f.as_str().to_string())).collect();
            replace_column(&mut frame, column, values)?;
        }
        let columns: Vec<Vec<QualityFlag>> = computed.into_iter().map(|(_, _, f)| f).collect();
        summary.histogram = flagged_histogram(df.height(), &columns);
        Ok(FlagOutcome { frame, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(n: usize) -> ItemBlock {
        ItemBlock::new("teacher", (1..=n).map(|i| format!("item{i}")).collect())
    }

    #[test]
    fn uniform_answers_with_random_skip_flag() {
        let mut values = vec![Some("Strongly agree"); 5];
        values.push(Some("Random Skip"));
        assert_eq!(
            straightline_flag(&block(6), &values, &[]),
            QualityFlag::Flagged
        );
    }

    #[test]
    fn one_differing_answer_does_not_flag() {
        let mut values = vec![Some("Strongly agree"); 4];
        values.push(Some("Agree"));
        values.push(Some("Random Skip"));
        assert_eq!(
            straightline_flag(&block(6), &values, &[]),
            QualityFlag::NotFlagged
        );
    }

    #[test]
    fn no_answers_do_not_flag() {
        let values = vec![None, Some("Valid Skip"), Some("No Response")];
        assert_eq!(
            straightline_flag(&block(3), &values, &[]),
            QualityFlag::NotFlagged
        );
    }

    #[test]
    fn precondition_gates_the_block() {
        let gated = block(3).with_precondition(
            vec!["item3".to_string()],
            vec!["Agree".to_string(), "Strongly agree".to_string()],
        );
        let values = vec![Some("Disagree"); 3];
        assert_eq!(
            straightline_flag(&gated, &values, &[Some("Disagree")]),
            QualityFlag::NotFlagged
        );
        let values = vec![Some("Agree"); 3];
        assert_eq!(
            straightline_flag(&gated, &values, &[Some("Agree")]),
            QualityFlag::Flagged
        );
    }

    #[test]
    fn closure_duration_consistency() {
        let check = ConsistencyCheck::new("closure", "closed", "closed_days");
        assert_eq!(
            consistency_flag(&check, Some("No"), Some("0")),
            QualityFlag::NotFlagged
        );
        assert_eq!(
            consistency_flag(&check, Some("No"), Some("5")),
            QualityFlag::Flagged
        );
        assert_eq!(
            consistency_flag(&check, Some("Yes, up to 1 month"), Some("0")),
            QualityFlag::Flagged
        );
        assert_eq!(
            consistency_flag(&check, Some("Yes, up to 1 month"), Some("12")),
            QualityFlag::NotFlagged
        );
        assert_eq!(
            consistency_flag(&check, Some("Valid Skip"), Some("5")),
            QualityFlag::NotFlagged
        );
    }

    #[test]
    fn histogram_counts_flags_per_row() {
        use QualityFlag::{Flagged as F, NotFlagged as N};
        let histogram = flagged_histogram(3, &[vec![F, F, N], vec![F, N, N], vec![F, F, N]]);
        assert_eq!(histogram.get(&3), Some(&1));
        assert_eq!(histogram.get(&2), Some(&1));
        assert_eq!(histogram.get(&0), Some(&1));
    }
}
