use std::fs;

use survey_ingest::{read_registry, write_registry};
use survey_model::{DataSource, VariableStatus};

const REGISTRY: &str = "\
original_variable_name,renamed_variable,variable_description,data_source,status,status_priority,status_reason,pisa_domain,pisa_ict_school_domain,pisa_ict_home_domain,oecd_framework_label
ST004D01T,gender,Student gender,student,Included,,,,,,Background
SC013Q01TA,,School type,school,Excluded,high,constant,,,,
IC001Q01TA,ict_home_desktop,Desktop at home,ict,,,,,,availability,Access
";

#[test]
fn reads_known_and_extra_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("registry.csv");
    fs::write(&path, REGISTRY).expect("write registry");

    let entries = read_registry(&path).expect("read registry");
    assert_eq!(entries.len(), 3);

    assert_eq!(entries[0].effective_name(), "gender");
    assert_eq!(entries[0].data_source, DataSource::Student);
    assert_eq!(
        entries[0].extra,
        vec![("oecd_framework_label".to_string(), "Background".to_string())]
    );

    assert_eq!(entries[1].effective_name(), "SC013Q01TA");
    assert_eq!(entries[1].status, VariableStatus::Excluded);
    assert_eq!(entries[1].status_reason.as_deref(), Some("constant"));

    assert_eq!(entries[2].status, VariableStatus::Included);
    assert_eq!(entries[2].pisa_ict_home_domain.as_deref(), Some("availability"));
}

#[test]
fn write_preserves_extra_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("registry.csv");
    fs::write(&path, REGISTRY).expect("write registry");
    let entries = read_registry(&path).expect("read registry");

    let out = dir.path().join("registry_out.csv");
    write_registry(&out, &entries).expect("write registry");
    let reread = read_registry(&out).expect("reread registry");
    assert_eq!(reread, entries);

    let text = fs::read_to_string(&out).expect("read output");
    assert!(text.lines().next().unwrap().ends_with(",oecd_framework_label"));
}

#[test]
fn missing_original_name_column_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bad.csv");
    fs::write(&path, "name,renamed_variable\nA,B\n").expect("write registry");
    let err = read_registry(&path).unwrap_err();
    assert!(err.to_string().contains("original_variable_name"));
}

#[test]
fn invalid_status_reports_line() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bad_status.csv");
    fs::write(&path, "original_variable_name,status\nA,Included\nB,Pending\n")
        .expect("write registry");
    let err = read_registry(&path).unwrap_err();
    assert!(err.to_string().contains("'Pending'"));
    assert!(err.to_string().contains("line 3"));
}
