use survey_ingest::{column_values, frame_from_columns};
use survey_validate::{ConsistencyCheck, FlagDetector, ItemBlock, VerifyError};

fn text(values: &[&str]) -> Vec<Option<String>> {
    values
        .iter()
        .map(|v| (!v.is_empty()).then(|| v.to_string()))
        .collect()
}

fn names(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{prefix}{i}")).collect()
}

fn frame() -> polars::prelude::DataFrame {
    let sa = "Strongly agree";
    let mut columns = vec![("id".to_string(), text(&["r1", "r2", "r3", "r4"]))];
    let teacher = [
        [sa, sa, "Agree", "Disagree"],
        [sa, sa, "Agree", "Disagree"],
        [sa, sa, "Agree", ""],
        [sa, sa, "Agree", "Disagree"],
        [sa, sa, "Agree", "Disagree"],
        ["Random Skip", "Agree", "Agree", "Disagree"],
    ];
    for (name, values) in names("teach", 6).into_iter().zip(teacher) {
        columns.push((name, text(&values)));
    }
    let feelings = [
        ["Often", "Never", "Often", "Never"],
        ["Often", "Never", "Often", "Never"],
        ["Often", "Never", "Often", "Never"],
    ];
    for (name, values) in names("feel", 3).into_iter().zip(feelings) {
        columns.push((name, text(&values)));
    }
    columns.push((
        "closed".to_string(),
        text(&["No", "No", "Yes, up to 1 month", "Valid Skip"]),
    ));
    columns.push(("closed_days".to_string(), text(&["0", "5", "0", "5"])));
    frame_from_columns(columns).expect("frame")
}

fn detector() -> FlagDetector {
    FlagDetector::new(
        vec![
            ItemBlock::new("teacher", names("teach", 6)),
            ItemBlock::new("feelings", names("feel", 3))
                .with_precondition(vec!["feel1".to_string()], vec!["Often".to_string()]),
        ],
        vec![ConsistencyCheck::new("closure", "closed", "closed_days")],
    )
    .expect("detector")
}

#[test]
fn flags_are_appended_and_counted() {
    let outcome = detector().detect(&frame()).expect("detect");
    assert_eq!(
        column_values(&outcome.frame, "flag_teacher").expect("teacher"),
        text(&["Flagged", "Not flagged", "Flagged", "Flagged"])
    );
    assert_eq!(
        column_values(&outcome.frame, "flag_feelings").expect("feelings"),
        text(&["Flagged", "Not flagged", "Flagged", "Not flagged"])
    );
    assert_eq!(
        column_values(&outcome.frame, "flag_closure").expect("closure"),
        text(&["Not flagged", "Flagged", "Flagged", "Not flagged"])
    );

    let summary = &outcome.summary;
    assert_eq!(summary.count_flagged_exactly(3), 1);
    assert_eq!(summary.count_flagged_exactly(2), 1);
    assert_eq!(summary.count_flagged_exactly(1), 2);
    assert_eq!(summary.count_flagged_exactly(0), 0);

    let rendered: Vec<String> = summary
        .flags
        .iter()
        .map(|f| format!("{} {} {}/{}", f.name, f.column, f.flagged, f.flagged + f.not_flagged))
        .collect();
    insta::assert_snapshot!(rendered.join("\n"), @r"
    teacher flag_teacher 3/4
    feelings flag_feelings 2/4
    closure flag_closure 2/4
    ");
}

#[test]
fn detection_is_repeatable_on_its_own_output() {
    let detector = detector();
    let first = detector.detect(&frame()).expect("first");
    let second = detector.detect(&first.frame).expect("second");
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.frame.width(), second.frame.width());
}

#[test]
fn flag_column_may_not_overwrite_items() {
    let mut block = ItemBlock::new("teacher", names("teach", 2));
    block.flag_column = Some("teach1".to_string());
    let err = FlagDetector::new(vec![block], Vec::new()).unwrap_err();
    assert!(matches!(err, VerifyError::Config(_)));
}

#[test]
fn missing_block_items_are_skipped() {
    let detector = FlagDetector::new(
        vec![ItemBlock::new("absent", names("nope", 3))],
        Vec::new(),
    )
    .expect("detector");
    let outcome = detector.detect(&frame()).expect("detect");
    assert!(outcome.summary.flags.is_empty());
    assert_eq!(outcome.summary.count_flagged_exactly(0), 4);
}
