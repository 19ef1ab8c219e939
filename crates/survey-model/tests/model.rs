//! Tests for survey-model types.

use survey_model::{
    ImputationOutcome, ImputationRecord, LevelMap, QualityFlag, RecodeRule, ResponseCategory,
    VariableMappingEntry,
};

#[test]
fn rule_serializes_with_snake_case_categories() {
    let rule = RecodeRule::categorical(
        "ST097Q01TA",
        LevelMap::new(true)
            .with_level("1", "Every lesson")
            .with_level("2", "Most lessons"),
    )
    .with_sentinel("95", ResponseCategory::ValidSkip)
    .with_sentinel("99", ResponseCategory::NoResponse);

    let json = serde_json::to_value(&rule).expect("serialize rule");
    assert_eq!(json["sentinels"]["95"], "valid_skip");
    assert_eq!(json["sentinels"]["99"], "no_response");
    assert_eq!(json["kind"], "categorical");

    let round: RecodeRule = serde_json::from_value(json).expect("deserialize rule");
    assert_eq!(round, rule);
}

#[test]
fn failed_outcome_serializes_reason() {
    let mut record = ImputationRecord::new("distress", "pmm");
    record.outcome = ImputationOutcome::Failed {
        reason: "singular design matrix".to_string(),
    };
    let json = serde_json::to_value(&record).expect("serialize record");
    assert_eq!(json["outcome"]["state"], "failed");
    assert_eq!(json["outcome"]["reason"], "singular design matrix");
}

#[test]
fn quality_flag_serializes_as_display_text() {
    let json = serde_json::to_string(&QualityFlag::NotFlagged).expect("serialize flag");
    assert_eq!(json, "\"Not flagged\"");
}

#[test]
fn registry_entry_defaults_to_included() {
    let entry = VariableMappingEntry::new("IC001Q01TA").with_rename("ict_home_desktop");
    assert!(entry.is_included());
    assert_eq!(entry.effective_name(), "ict_home_desktop");
}
