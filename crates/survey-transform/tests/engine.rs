use proptest::prelude::{Just, Strategy, prop_assert_eq, prop_oneof, proptest};
use survey_ingest::{column_values, frame_from_columns};
use survey_model::{LevelMap, RecodeRule, ResponseCategory};
use survey_transform::{RecodeEngine, RecodeMode, RuleTable};

fn frequency_rule(variable: &str) -> RecodeRule {
    RecodeRule::categorical(
        variable,
        LevelMap::new(true)
            .with_level("1", "Never or almost never")
            .with_level("2", "Some lessons")
            .with_level("3", "Most lessons")
            .with_level("4", "Every lesson"),
    )
    .with_sentinel("95", ResponseCategory::ValidSkip)
    .with_sentinel("97", ResponseCategory::RandomSkip)
    .with_sentinel("98", ResponseCategory::NotApplicable)
    .with_sentinel("99", ResponseCategory::NoResponse)
}

fn table() -> RuleTable {
    RuleTable::from_rules([
        frequency_rule("ST097Q01TA"),
        RecodeRule::numeric("AGE")
            .with_range(15.0, 17.0)
            .with_sentinel("9997", ResponseCategory::NotApplicable)
            .with_sentinel("9999", ResponseCategory::Missing),
        RecodeRule::categorical(
            "IC001Q01TA",
            LevelMap::new(false)
                .with_level("1", "Yes, and I use it")
                .with_level("2", "Yes, but I don't use it")
                .with_level("3", "No"),
        )
        .with_custom("Y", "1")
        .with_custom("5", "3")
        .with_sentinel("8", ResponseCategory::Missing)
        .with_sentinel("9", ResponseCategory::NoResponse),
    ])
    .expect("rule table")
}

fn text(values: &[&str]) -> Vec<Option<String>> {
    values
        .iter()
        .map(|v| (!v.is_empty()).then(|| v.to_string()))
        .collect()
}

#[test]
fn recoding_eliminates_literal_sentinels() {
    let df = frame_from_columns(vec![
        ("CNTSTUID".to_string(), text(&["1", "2", "3", "4", "5"])),
        ("ST097Q01TA".to_string(), text(&["1", "95", "97", "4", "95"])),
        ("AGE".to_string(), text(&["15.25", "9997", "9999", "16", ""])),
    ])
    .expect("frame");
    let table = table();
    let outcome = RecodeEngine::new(&table, RecodeMode::Strict)
        .recode(&df)
        .expect("recode");

    let items = column_values(&outcome.frame, "ST097Q01TA").expect("items");
    assert!(
        items
            .iter()
            .flatten()
            .all(|value| value != "95" && value != "97")
    );
    assert_eq!(
        items,
        text(&["Never or almost never", "Valid Skip", "Random Skip", "Every lesson", "Valid Skip"])
    );
    assert_eq!(
        column_values(&outcome.frame, "AGE").expect("age"),
        text(&["15.25", "Not Applicable", "", "16", ""])
    );
    assert_eq!(outcome.report.unrecoded, vec!["CNTSTUID"]);

    let age = outcome.report.variable("AGE").expect("age report");
    assert_eq!(age.count(ResponseCategory::Substantive), 2);
    assert_eq!(age.count(ResponseCategory::Missing), 2);
}

#[test]
fn level_order_survives_recoding() {
    let table = RuleTable::from_rules([
        frequency_rule("ST097Q01TA"),
        RecodeRule::categorical(
            "ST004D01T",
            LevelMap::new(false)
                .with_level("2", "Male")
                .with_level("1", "Female"),
        ),
        RecodeRule::numeric("AGE").with_range(15.0, 17.0),
    ])
    .expect("rule table");
    let df = frame_from_columns(vec![
        ("ST097Q01TA".to_string(), text(&["4", "1", "95"])),
        ("ST004D01T".to_string(), text(&["1", "2", "1"])),
        ("AGE".to_string(), text(&["15", "16", "17"])),
    ])
    .expect("frame");
    let engine = RecodeEngine::new(&table, RecodeMode::Strict);
    let once = engine.recode(&df).expect("first pass");
    let twice = engine.recode(&once.frame).expect("second pass");

    for report in [&once.report, &twice.report] {
        let items = report.variable("ST097Q01TA").expect("items");
        assert_eq!(items.ordered, Some(true));
        assert_eq!(
            items.levels,
            vec!["Never or almost never", "Some lessons", "Most lessons", "Every lesson"]
        );
        let gender = report.variable("ST004D01T").expect("gender");
        assert_eq!(gender.ordered, Some(false));
        assert_eq!(gender.levels, vec!["Male", "Female"]);
        let age = report.variable("AGE").expect("age");
        assert_eq!(age.ordered, None);
        assert!(age.levels.is_empty());
    }
}

#[test]
fn absent_rule_variables_are_reported() {
    let df = frame_from_columns(vec![("AGE".to_string(), text(&["16"]))]).expect("frame");
    let table = table();
    let outcome = RecodeEngine::new(&table, RecodeMode::Permissive)
        .recode(&df)
        .expect("recode");
    assert_eq!(outcome.report.absent, vec!["ST097Q01TA"]);
}

fn raw_code() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        (1u8..=6).prop_map(|v| Some(v.to_string())),
        prop_oneof![Just("95"), Just("97"), Just("98"), Just("99"), Just("01"), Just(" 3 ")]
            .prop_map(|v| Some(v.to_string())),
    ]
}

fn raw_age() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        (140u16..=180).prop_map(|v| Some(format!("{}", f64::from(v) / 10.0))),
        prop_oneof![Just("9997"), Just("9999"), Just("16.00"), Just("n/a")]
            .prop_map(|v| Some(v.to_string())),
    ]
}

fn raw_device() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        (1u8..=6).prop_map(|v| Some(v.to_string())),
        prop_oneof![Just("Y"), Just("5"), Just("8"), Just("9"), Just("08.0")]
            .prop_map(|v| Some(v.to_string())),
    ]
}

fn raw_rows() -> impl Strategy<Value = Vec<(Option<String>, Option<String>, Option<String>)>> {
    proptest::collection::vec((raw_code(), raw_age(), raw_device()), 1..40)
}

proptest! {
    #[test]
    fn buckets_partition_rows(values in proptest::collection::vec(raw_code(), 0..40)) {
        let table = table();
        let engine = RecodeEngine::new(&table, RecodeMode::Permissive);
        let (_, report) = engine
            .recode_values(table.get("ST097Q01TA").expect("rule"), &values)
            .expect("recode");
        let total: usize = ResponseCategory::ALL.iter().map(|c| report.count(*c)).sum();
        prop_assert_eq!(total, values.len());
    }

    #[test]
    fn recoding_is_idempotent(rows in raw_rows()) {
        let table = table();
        let mut items = Vec::with_capacity(rows.len());
        let mut ages = Vec::with_capacity(rows.len());
        let mut devices = Vec::with_capacity(rows.len());
        for (item, age, device) in rows {
            items.push(item);
            ages.push(age);
            devices.push(device);
        }
        let df = frame_from_columns(vec![
            ("ST097Q01TA".to_string(), items),
            ("AGE".to_string(), ages),
            ("IC001Q01TA".to_string(), devices),
        ])
        .expect("frame");
        let engine = RecodeEngine::new(&table, RecodeMode::Permissive);
        let once = engine.recode(&df).expect("first pass");
        let twice = engine.recode(&once.frame).expect("second pass");
        for name in ["ST097Q01TA", "AGE", "IC001Q01TA"] {
            prop_assert_eq!(
                column_values(&once.frame, name).expect("once"),
                column_values(&twice.frame, name).expect("twice")
            );
        }
        prop_assert_eq!(twice.report.changed_total(), 0);
        prop_assert_eq!(twice.report.unclassified_total(), 0);
    }
}
