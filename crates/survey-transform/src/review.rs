//! Sentinel reuse review.
//!
//! The same literal code can mean different things in different variables
//! (`95` is a valid skip almost everywhere but a substantive answer in a few
//! places). Sentinel maps are strictly per variable, so the table is never
//! "fixed" automatically; reuse is only reported for manual review.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use survey_model::{RecodeRule, ResponseCategory, VariableKind, parse_number};

use crate::rule_table::RuleTable;

/// One code with more than one meaning across the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentinelReuse {
    pub code: String,
    /// Variables grouped by the meaning the code has for them.
    pub meanings: BTreeMap<ResponseCategory, Vec<String>>,
}

fn meaning(rule: &RecodeRule, code: &str) -> Option<ResponseCategory> {
    if let Some(category) = rule.sentinel_category(code) {
        return Some(category);
    }
    let substantive = match rule.kind {
        VariableKind::Categorical => rule
            .levels
            .as_ref()
            .is_some_and(|levels| levels.label_for(code).is_some()),
        VariableKind::Numeric => match (rule.range, parse_number(code)) {
            (Some(range), Some(number)) => range.contains(number),
            _ => false,
        },
    };
    substantive.then_some(ResponseCategory::Substantive)
}

/// Every sentinel code whose meaning differs between two rules.
pub fn review_sentinel_reuse(table: &RuleTable) -> Vec<SentinelReuse> {
    let mut codes: Vec<&str> = table
        .iter()
        .flat_map(|rule| rule.sentinels.keys().map(String::as_str))
        .collect();
    codes.sort_unstable();
    codes.dedup();

    let mut findings = Vec::new();
    for code in codes {
        let mut meanings: BTreeMap<ResponseCategory, Vec<String>> = BTreeMap::new();
        for rule in table.iter() {
            if let Some(category) = meaning(rule, code) {
                meanings
                    .entry(category)
                    .or_default()
                    .push(rule.variable.clone());
            }
        }
        if meanings.len() > 1 {
            let summary: Vec<String> = meanings
                .iter()
                .map(|(category, variables)| format!("{category}: {}", variables.join(", ")))
                .collect();
            warn!(
                code,
                meanings = %summary.join("; "),
                "sentinel code reused with different meanings"
            );
            findings.push(SentinelReuse {
                code: code.to_string(),
                meanings,
            });
        }
    }
    findings
}
