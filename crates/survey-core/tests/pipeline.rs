use std::fs;
use std::path::Path;

use survey_core::{Journal, PipelineError, Pipeline, ProjectConfig, Stage, file_sha256};
use survey_ingest::{column_names, column_values, read_dataset};
use survey_model::ResponseCategory;

const RAW: &str = "\
CNTSTUID,ST001,ST002,AGE,CONST
s1,1,2,15,x
s2,95,1,16,x
s3,2,99,99,x
s4,1,1,17,x
";

const REGISTRY: &str = "\
original_variable_name,renamed_variable,variable_description,data_source,status
CNTSTUID,id,Student id,student,
ST001,likes_school,Likes school,student,
ST002,feels_safe,Feels safe at school,student,
AGE,age,Age in years,student,
CONST,cycle_marker,Constant marker,other,
";

const RULES: &str = r#"{
  "profiles": { "standard": { "95": "valid_skip", "97": "random_skip", "99": "no_response" } },
  "scales": {
    "yes_no": { "levels": [ { "code": "1", "label": "Yes" }, { "code": "2", "label": "No" } ] }
  },
  "rules": [
    { "variables": ["likes_school", "feels_safe"], "profile": "standard", "scale": "yes_no" },
    { "variable": "age", "kind": "numeric", "profile": "standard", "range": { "min": 15, "max": 17 } }
  ]
}"#;

const CONFIG: &str = r#"
[project]
raw_input = "raw.csv"
registry = "registry.csv"
rules = "rules.json"
id_column = "id"

[[exclusions]]
name = "constant"
kind = "constant"
reason = "no variance"

[[imputations]]
target = "feels_safe"
method = "mode"

[[blocks]]
name = "attitude"
items = ["likes_school", "feels_safe"]
"#;

fn project(dir: &Path) -> Pipeline {
    fs::write(dir.join("raw.csv"), RAW).expect("write raw");
    fs::write(dir.join("registry.csv"), REGISTRY).expect("write registry");
    fs::write(dir.join("rules.json"), RULES).expect("write rules");
    fs::write(dir.join("survey.toml"), CONFIG).expect("write config");
    Pipeline::open(&dir.join("survey.toml")).expect("open project")
}

fn text(values: &[&str]) -> Vec<Option<String>> {
    values
        .iter()
        .map(|v| (!v.is_empty()).then(|| v.to_string()))
        .collect()
}

#[test]
fn full_run_produces_every_artifact() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = project(dir.path());
    let run = pipeline.run().expect("run pipeline");

    for stage in Stage::ALL {
        assert!(pipeline.store().exists(stage), "{stage} missing");
        assert!(pipeline.store().audit_path(stage).is_file());
    }

    let raw_tally = run.ingest.audit.tally.variable("ST001").expect("raw ST001");
    assert_eq!(raw_tally.sentinel_count("95"), 1);
    assert_eq!(run.rename.audit.plan.renamed_count(), 5);

    let recoded = read_dataset(&pipeline.store().dataset_path(Stage::Recoded)).expect("read 03");
    assert_eq!(
        column_values(&recoded, "likes_school").expect("likes_school"),
        text(&["Yes", "Valid Skip", "No", "Yes"])
    );
    assert_eq!(
        column_values(&recoded, "age").expect("age"),
        text(&["15", "16", "No Response", "17"])
    );
    let after = &run.recode.audit.after;
    assert_eq!(after.category_total(ResponseCategory::ValidSkip), 1);
    assert_eq!(after.category_total(ResponseCategory::NoResponse), 2);

    let imputed = read_dataset(&pipeline.store().dataset_path(Stage::Imputed)).expect("read 04");
    assert_eq!(
        column_values(&imputed, "feels_safe").expect("feels_safe"),
        text(&["No", "Yes", "Yes", "Yes"])
    );
    assert_eq!(run.impute.audit.records[0].affected_record_ids, vec!["s3"]);

    let flagged = read_dataset(&pipeline.store().dataset_path(Stage::Flagged)).expect("read 05");
    assert_eq!(column_names(&flagged).last().map(String::as_str), Some("flag_attitude"));
    assert_eq!(run.flag.audit.summary.flags[0].flagged, 2);

    let journal = Journal::load(pipeline.store().dir()).expect("journal");
    assert_eq!(journal.entries.len(), 5);
    assert_eq!(
        journal.latest(&Stage::Flagged.artifact()).map(|e| e.sha256.as_str()),
        Some(run.flag.artifact.sha256.as_str())
    );
}

#[test]
fn rerun_reproduces_artifacts_byte_for_byte() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = project(dir.path());
    pipeline.run().expect("first run");
    let digests: Vec<String> = Stage::ALL
        .iter()
        .map(|stage| file_sha256(&pipeline.store().dataset_path(*stage)).expect("digest"))
        .collect();
    let audits: Vec<String> = Stage::ALL
        .iter()
        .map(|stage| fs::read_to_string(pipeline.store().audit_path(*stage)).expect("audit"))
        .collect();

    pipeline.run().expect("second run");
    for (idx, stage) in Stage::ALL.iter().enumerate() {
        assert_eq!(
            file_sha256(&pipeline.store().dataset_path(*stage)).expect("digest"),
            digests[idx]
        );
        assert_eq!(
            fs::read_to_string(pipeline.store().audit_path(*stage)).expect("audit"),
            audits[idx]
        );
    }
    let journal = Journal::load(pipeline.store().dir()).expect("journal");
    assert_eq!(journal.entries.len(), 10);
}

#[test]
fn stage_without_input_reports_missing_artifact() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = project(dir.path());
    match pipeline.recode() {
        Err(PipelineError::MissingArtifact { stage, artifact, .. }) => {
            assert_eq!(stage, "03_recoded");
            assert_eq!(artifact, "02_renamed");
        }
        other => panic!("expected missing artifact, got {other:?}"),
    }
    assert!(!pipeline.store().exists(Stage::Recoded));
}

#[test]
fn exclusion_drops_variable_on_next_rename() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = project(dir.path());
    pipeline.run().expect("run");

    let outcome = pipeline.exclude(Stage::Recoded).expect("exclude");
    assert_eq!(outcome.excluded_total, 1);
    assert_eq!(outcome.updates[0].matched, 1);
    assert!(outcome.conflicts.is_empty());

    let registry = pipeline.registry().expect("reload registry");
    assert!(!registry.is_included("CONST"));

    let renamed = pipeline.rename().expect("rename again");
    assert_eq!(renamed.audit.dropped, vec!["cycle_marker"]);
    let frame = read_dataset(&renamed.artifact.path).expect("read 02");
    assert!(!column_names(&frame).contains(&"cycle_marker".to_string()));
}

#[test]
fn invalid_config_is_reported_with_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("survey.toml");
    fs::write(&path, "[recode]\nmode = \"loose\"\n").expect("write config");
    let err = ProjectConfig::load(&path).expect_err("invalid config");
    assert!(err.to_string().contains("survey.toml"));
}
