//! Structural checks on a single recode rule.
//!
//! A rule passing these checks recodes its own output to itself: labels and
//! markers can never be mistaken for raw codes on a second pass.

use std::collections::BTreeSet;

use survey_model::{RecodeRule, ResponseCategory, normalize_code};

use crate::error::RuleError;

fn collision(rule: &RecodeRule, value: &str, detail: &'static str) -> RuleError {
    RuleError::CodeCollision {
        variable: rule.variable.clone(),
        value: value.to_string(),
        detail,
    }
}

pub fn validate_rule(rule: &RecodeRule) -> Result<(), RuleError> {
    if rule.variable.trim().is_empty() {
        return Err(RuleError::Invalid {
            variable: rule.variable.clone(),
            message: "empty variable name".to_string(),
        });
    }
    if let Some(range) = rule.range
        && range.min > range.max
    {
        return Err(RuleError::Invalid {
            variable: rule.variable.clone(),
            message: format!("range {}..{} is empty", range.min, range.max),
        });
    }

    for (from, to) in &rule.custom {
        if from != to && rule.custom.contains_key(to) {
            return Err(RuleError::ChainedCustom {
                variable: rule.variable.clone(),
                code: to.clone(),
            });
        }
        if ResponseCategory::from_marker(from).is_some() {
            return Err(collision(rule, from, "is a taxonomy marker used as a custom source"));
        }
    }

    let Some(levels) = &rule.levels else {
        return Ok(());
    };
    let mut codes = BTreeSet::new();
    let mut labels = BTreeSet::new();
    for level in &levels.levels {
        if !codes.insert(level.code.as_str()) {
            return Err(collision(rule, &level.code, "is declared as a level twice"));
        }
        if !labels.insert(level.label.as_str()) {
            return Err(collision(rule, &level.label, "labels two levels"));
        }
        if rule.sentinels.contains_key(&level.code) {
            return Err(RuleError::SentinelLevel {
                variable: rule.variable.clone(),
                code: level.code.clone(),
            });
        }
        if level.label.is_empty() {
            return Err(collision(rule, &level.code, "has an empty label"));
        }
        if ResponseCategory::from_marker(&level.label).is_some() {
            return Err(collision(rule, &level.label, "is a taxonomy marker used as a label"));
        }
    }
    for label in &labels {
        // Raw codes are compared after normalization, so "02" reads as "2".
        let Some(as_code) = normalize_code(label) else {
            continue;
        };
        if codes.contains(as_code.as_str()) {
            return Err(collision(rule, label, "is both a label and a level code"));
        }
        if rule.sentinels.contains_key(&as_code) {
            return Err(collision(rule, label, "is both a label and a sentinel code"));
        }
        if rule.custom.contains_key(&as_code) {
            return Err(collision(rule, label, "is both a label and a custom source"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use survey_model::LevelMap;

    use super::*;

    fn yes_no() -> LevelMap {
        LevelMap::new(false)
            .with_level("1", "Yes")
            .with_level("2", "No")
    }

    #[test]
    fn accepts_well_formed_rule() {
        let rule = RecodeRule::categorical("A", yes_no())
            .with_sentinel("95", ResponseCategory::ValidSkip)
            .with_custom("7", "1");
        assert!(validate_rule(&rule).is_ok());
    }

    #[test]
    fn rejects_chained_custom_maps() {
        let rule = RecodeRule::categorical("A", yes_no())
            .with_custom("7", "8")
            .with_custom("8", "1");
        assert!(matches!(
            validate_rule(&rule),
            Err(RuleError::ChainedCustom { code, .. }) if code == "8"
        ));
    }

    #[test]
    fn rejects_level_that_is_sentinel() {
        let rule =
            RecodeRule::categorical("A", yes_no()).with_sentinel("2", ResponseCategory::NoResponse);
        assert!(matches!(
            validate_rule(&rule),
            Err(RuleError::SentinelLevel { .. })
        ));
    }

    #[test]
    fn rejects_label_that_is_a_code() {
        let levels = LevelMap::new(true)
            .with_level("1", "2")
            .with_level("2", "3 or more");
        let err = validate_rule(&RecodeRule::categorical("A", levels)).unwrap_err();
        assert!(err.to_string().contains("both a label and a level code"));
    }

    #[test]
    fn rejects_label_that_normalizes_to_a_code() {
        let levels = LevelMap::new(true)
            .with_level("2", "Two")
            .with_level("3", "02");
        let err = validate_rule(&RecodeRule::categorical("A", levels)).unwrap_err();
        assert!(matches!(
            &err,
            RuleError::CodeCollision { value, .. } if value == "02"
        ));
        assert!(err.to_string().contains("both a label and a level code"));

        let padded = RecodeRule::categorical("B", LevelMap::new(false).with_level("1", " 95.0"))
            .with_sentinel("95", ResponseCategory::ValidSkip);
        let err = validate_rule(&padded).unwrap_err();
        assert!(err.to_string().contains("both a label and a sentinel code"));

        let custom = RecodeRule::categorical("C", LevelMap::new(false).with_level("1", "7.0"))
            .with_custom("7", "1");
        let err = validate_rule(&custom).unwrap_err();
        assert!(err.to_string().contains("both a label and a custom source"));
    }

    #[test]
    fn rejects_marker_label() {
        let levels = LevelMap::new(false).with_level("1", "Valid Skip");
        assert!(validate_rule(&RecodeRule::categorical("A", levels)).is_err());
    }
}
