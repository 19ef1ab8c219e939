use std::path::Path;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use survey_core::{ArtifactInfo, ExclusionOutcome, RecodeAudit, RenameAudit, RulesCheck, RunSummary};
use survey_model::{ImputationOutcome, ImputationRecord, ResponseCategory};
use survey_transform::SentinelReuse;
use survey_validate::{FlagSummary, TallySnapshot};

const NON_SUBSTANTIVE: [ResponseCategory; 5] = [
    ResponseCategory::ValidSkip,
    ResponseCategory::RandomSkip,
    ResponseCategory::NotApplicable,
    ResponseCategory::NoResponse,
    ResponseCategory::Missing,
];

pub fn print_stage(artifact: &ArtifactInfo, audit_path: &Path) {
    println!(
        "{}: {} rows x {} columns -> {}",
        artifact.name,
        artifact.rows,
        artifact.columns,
        artifact.path.display()
    );
    println!("  sha256 {}", artifact.sha256);
    println!("  audit  {}", audit_path.display());
}

pub fn print_run(summary: &RunSummary) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Artifact"),
        header_cell("Rows"),
        header_cell("Columns"),
        header_cell("SHA-256"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for artifact in [
        &summary.ingest.artifact,
        &summary.rename.artifact,
        &summary.recode.artifact,
        &summary.impute.artifact,
        &summary.flag.artifact,
    ] {
        table.add_row(vec![
            Cell::new(&artifact.name).add_attribute(Attribute::Bold),
            Cell::new(artifact.rows),
            Cell::new(artifact.columns),
            dim_cell(&artifact.sha256[..artifact.sha256.len().min(16)]),
        ]);
    }
    println!("{table}");
    print_rename(&summary.rename.audit);
    print_recode(&summary.recode.audit);
    print_imputations(&summary.impute.audit.records);
    print_flags(&summary.flag.audit.summary);
}

pub fn print_rename(audit: &RenameAudit) {
    println!(
        "Renamed {} variables, dropped {} excluded",
        audit.plan.renamed_count(),
        audit.dropped.len()
    );
    for absent in &audit.plan.absent {
        match &absent.suggestion {
            Some(suggestion) => println!(
                "  registry variable {} not in dataset (did you mean {suggestion}?)",
                absent.original
            ),
            None => println!("  registry variable {} not in dataset", absent.original),
        }
    }
}

pub fn print_recode(audit: &RecodeAudit) {
    let mut table = Table::new();
    let mut header = vec![header_cell("Variable"), header_cell("Substantive")];
    header.extend(NON_SUBSTANTIVE.iter().map(|c| header_cell(c.as_str())));
    header.push(header_cell("Unclassified"));
    header.push(header_cell("Changed"));
    header.push(header_cell("Scale"));
    table.set_header(header);
    apply_summary_table_style(&mut table);
    for index in 1..=8 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for report in &audit.report.variables {
        let mut row = vec![
            Cell::new(&report.variable),
            Cell::new(report.count(ResponseCategory::Substantive)),
        ];
        row.extend(NON_SUBSTANTIVE.iter().map(|c| count_cell(report.count(*c), Color::Yellow)));
        row.push(count_cell(report.unclassified_total(), Color::Red));
        row.push(Cell::new(report.changed));
        row.push(dim_cell(match report.ordered {
            Some(true) => "ordinal",
            Some(false) => "nominal",
            None => "numeric",
        }));
        table.add_row(row);
    }
    println!("{table}");
    if !audit.report.absent.is_empty() {
        println!("Rules without a dataset column: {}", audit.report.absent.join(", "));
    }
    if !audit.report.unrecoded.is_empty() {
        println!(
            "Columns without a rule: {}",
            audit.report.unrecoded.len()
        );
    }
    print_sentinel_reuse(&audit.sentinel_reuse);
}

pub fn print_imputations(records: &[ImputationRecord]) {
    if records.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Method"),
        header_cell("Predictors"),
        header_cell("Filled"),
        header_cell("Unresolved"),
        header_cell("Outcome"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for record in records {
        let outcome = match &record.outcome {
            ImputationOutcome::Completed => Cell::new("completed").fg(Color::Green),
            ImputationOutcome::Failed { reason } => {
                Cell::new(format!("failed: {reason}")).fg(Color::Red)
            }
        };
        let predictors = if record.predictor_set.is_empty() {
            "-".to_string()
        } else {
            record.predictor_set.join(", ")
        };
        table.add_row(vec![
            Cell::new(&record.variable_name),
            Cell::new(&record.method),
            Cell::new(predictors),
            Cell::new(record.changed_count()),
            count_cell(record.unresolved_record_ids.len(), Color::Yellow),
            outcome,
        ]);
    }
    println!("{table}");
}

pub fn print_flags(summary: &FlagSummary) {
    if summary.flags.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Flag"),
        header_cell("Column"),
        header_cell("Flagged"),
        header_cell("Not flagged"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for flag in &summary.flags {
        table.add_row(vec![
            Cell::new(&flag.name),
            Cell::new(&flag.column),
            count_cell(flag.flagged, Color::Yellow),
            Cell::new(flag.not_flagged),
        ]);
    }
    println!("{table}");
    let histogram: Vec<String> = summary
        .histogram
        .iter()
        .map(|(raised, respondents)| format!("{raised} flags: {respondents}"))
        .collect();
    println!("Respondents by flags raised: {}", histogram.join(", "));
}

pub fn print_tally(snapshot: &TallySnapshot, sentinels_only: bool) {
    println!("{}: {} rows", snapshot.stage, snapshot.rows);
    let mut table = Table::new();
    let mut header = vec![header_cell("Variable"), header_cell("Substantive")];
    header.extend(NON_SUBSTANTIVE.iter().map(|c| header_cell(c.as_str())));
    header.push(header_cell("Sentinel codes"));
    table.set_header(header);
    apply_summary_table_style(&mut table);
    for index in 1..=6 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for tally in &snapshot.variables {
        if sentinels_only && tally.sentinel_codes.is_empty() {
            continue;
        }
        let codes: Vec<String> = tally
            .sentinel_codes
            .iter()
            .map(|(code, count)| format!("{code}x{count}"))
            .collect();
        let mut row = vec![
            Cell::new(&tally.variable),
            Cell::new(tally.count(ResponseCategory::Substantive)),
        ];
        row.extend(NON_SUBSTANTIVE.iter().map(|c| count_cell(tally.count(*c), Color::Yellow)));
        row.push(if codes.is_empty() {
            dim_cell("-")
        } else {
            Cell::new(codes.join(" ")).fg(Color::Red)
        });
        table.add_row(row);
    }
    println!("{table}");
}

pub fn print_rules_check(check: &RulesCheck) {
    println!("Rule table OK: {} variables", check.rules);
    print_sentinel_reuse(&check.sentinel_reuse);
}

pub fn print_exclusions(outcome: &ExclusionOutcome) {
    println!("Exclusion rules evaluated on {}", outcome.evaluated_on);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rule"),
        header_cell("Matched"),
        header_cell("Changed"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for update in &outcome.updates {
        table.add_row(vec![
            Cell::new(&update.rule),
            Cell::new(update.matched),
            Cell::new(update.changed),
        ]);
    }
    println!("{table}");
    println!("Excluded variables in registry: {}", outcome.excluded_total);
    if outcome.conflicts.is_empty() {
        return;
    }
    let mut conflicts = Table::new();
    conflicts.set_header(vec![
        header_cell("Variable"),
        header_cell("Earlier rule"),
        header_cell("Earlier status"),
        header_cell("Rule"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut conflicts);
    for conflict in &outcome.conflicts {
        conflicts.add_row(vec![
            Cell::new(&conflict.variable),
            Cell::new(&conflict.previous_rule),
            Cell::new(conflict.previous_status.as_str()),
            Cell::new(&conflict.rule),
            Cell::new(conflict.status.as_str()).fg(Color::Yellow),
        ]);
    }
    println!("Conflicting assignments (last rule wins):");
    println!("{conflicts}");
}

fn print_sentinel_reuse(findings: &[SentinelReuse]) {
    if findings.is_empty() {
        return;
    }
    println!("Codes with more than one meaning:");
    for finding in findings {
        let meanings: Vec<String> = finding
            .meanings
            .iter()
            .map(|(category, variables)| format!("{} ({})", category.as_str(), variables.len()))
            .collect();
        println!("  {}: {}", finding.code, meanings.join(", "));
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn dim_cell(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).add_attribute(Attribute::Dim)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(165);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}
