//! Mode resolution.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use survey_model::{RecodeRule, ResponseCategory, parse_number};

fn code_of(rule: Option<&RecodeRule>, value: &str) -> Option<f64> {
    match rule {
        Some(rule) => rule.coded_value(value).or_else(|| parse_number(value)),
        None => parse_number(value),
    }
}

fn tie_order(rule: Option<&RecodeRule>, a: &str, b: &str) -> Ordering {
    match (code_of(rule, a), code_of(rule, b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Most frequent substantive value of a column.
///
/// Non-substantive cells never count. Ties go to the smallest underlying
/// code, so the result depends only on the multiset of values.
pub fn resolve_mode(values: &[Option<String>], rule: Option<&RecodeRule>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.iter().flatten() {
        if ResponseCategory::of_recoded(Some(value.as_str())).is_administered() {
            *counts.entry(value.trim()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .min_by(|(a, count_a), (b, count_b)| {
            count_b.cmp(count_a).then_with(|| tie_order(rule, a, b))
        })
        .map(|(value, _)| value.to_string())
}
