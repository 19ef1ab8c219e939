//! Append-only audit records written by the imputation stage.

use serde::{Deserialize, Serialize};

/// One cell changed by imputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputedCell {
    pub record_id: String,
    pub value_before: Option<String>,
    pub value_after: String,
}

/// Result of imputing one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImputationOutcome {
    Completed,
    /// The variable kept its original missingness.
    Failed { reason: String },
}

impl ImputationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Audit trail for one imputation run of one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputationRecord {
    pub variable_name: String,
    pub method: String,
    pub predictor_set: Vec<String>,
    pub affected_record_ids: Vec<String>,
    pub cells: Vec<ImputedCell>,
    /// Eligible cells that could not be filled.
    pub unresolved_record_ids: Vec<String>,
    pub outcome: ImputationOutcome,
}

impl ImputationRecord {
    pub fn new(variable_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            variable_name: variable_name.into(),
            method: method.into(),
            predictor_set: Vec::new(),
            affected_record_ids: Vec::new(),
            cells: Vec::new(),
            unresolved_record_ids: Vec::new(),
            outcome: ImputationOutcome::Completed,
        }
    }

    pub fn push_change(
        &mut self,
        record_id: impl Into<String>,
        before: Option<String>,
        after: impl Into<String>,
    ) {
        let record_id = record_id.into();
        self.affected_record_ids.push(record_id.clone());
        self.cells.push(ImputedCell {
            record_id,
            value_before: before,
            value_after: after.into(),
        });
    }

    pub fn changed_count(&self) -> usize {
        self.cells.len()
    }
}
