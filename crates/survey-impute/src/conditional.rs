//! Rule-based conditional fill.
//!
//! Unlike the statistical methods this is a logical rule over related items,
//! e.g. a distress indicator is set to "not distressed" when enough of its
//! source items are answered and all of them give the least severe response.

use survey_model::ResponseCategory;

use crate::error::{ImputeError, Result};
use crate::settings::ConditionalSettings;

pub fn check_settings(settings: &ConditionalSettings) -> Result<()> {
    if settings.items.is_empty() {
        return Err(ImputeError::Config("conditional rule names no items".to_string()));
    }
    if settings.min_valid == 0 || settings.min_valid > settings.items.len() {
        return Err(ImputeError::Config(format!(
            "min_valid {} is outside 1..={}",
            settings.min_valid,
            settings.items.len()
        )));
    }
    Ok(())
}

/// Whether one row's item values satisfy the rule.
pub fn rule_applies(settings: &ConditionalSettings, items: &[Option<&str>]) -> bool {
    let valid: Vec<&str> = items
        .iter()
        .filter_map(|value| {
            let value = (*value)?.trim();
            ResponseCategory::of_recoded(Some(value))
                .is_administered()
                .then_some(value)
        })
        .collect();
    valid.len() >= settings.min_valid
        && valid.iter().all(|value| *value == settings.least_severe.trim())
}
