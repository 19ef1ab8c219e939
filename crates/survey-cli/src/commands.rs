use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use survey_core::{ExclusionOutcome, Pipeline, ProjectConfig, RulesCheck, RunSummary, Stage};
use survey_transform::RecodeMode;
use survey_validate::TallySnapshot;

use crate::cli::{
    Command, ExcludeArgs, RecodeArgs, RecodeModeArg, RegistryCommand, RulesCommand, TallyArgs,
};
use crate::summary::{
    print_exclusions, print_flags, print_imputations, print_recode, print_rename, print_rules_check,
    print_run, print_stage, print_tally,
};

fn open_pipeline(config_path: &Path, mode: Option<RecodeModeArg>) -> Result<Pipeline> {
    let mut config = ProjectConfig::load(config_path)
        .with_context(|| format!("load project config {}", config_path.display()))?;
    if let Some(mode) = mode {
        config.recode.mode = match mode {
            RecodeModeArg::Strict => RecodeMode::Strict,
            RecodeModeArg::Permissive => RecodeMode::Permissive,
        };
    }
    info!(work_dir = %config.work_dir().display(), "opened project");
    Ok(Pipeline::new(config))
}

fn parse_stage(value: &str) -> Result<Stage> {
    Stage::parse(value).ok_or_else(|| {
        let known: Vec<String> = Stage::ALL.iter().map(Stage::artifact).collect();
        anyhow!("unknown artifact '{value}' (expected one of {})", known.join(", "))
    })
}

pub fn run_command(command: &Command, config_path: &Path) -> Result<()> {
    match command {
        Command::Ingest => {
            let outcome = open_pipeline(config_path, None)?
                .ingest()
                .context("ingest raw extract")?;
            print_stage(&outcome.artifact, &outcome.audit_path);
        }
        Command::Rename => {
            let outcome = open_pipeline(config_path, None)?
                .rename()
                .context("rename variables")?;
            print_stage(&outcome.artifact, &outcome.audit_path);
            print_rename(&outcome.audit);
        }
        Command::Recode(RecodeArgs { mode }) => {
            let outcome = open_pipeline(config_path, *mode)?
                .recode()
                .context("recode variables")?;
            print_stage(&outcome.artifact, &outcome.audit_path);
            print_recode(&outcome.audit);
        }
        Command::Impute => {
            let outcome = open_pipeline(config_path, None)?
                .impute()
                .context("impute variables")?;
            print_stage(&outcome.artifact, &outcome.audit_path);
            print_imputations(&outcome.audit.records);
        }
        Command::Flag => {
            let outcome = open_pipeline(config_path, None)?
                .flag()
                .context("compute quality flags")?;
            print_stage(&outcome.artifact, &outcome.audit_path);
            print_flags(&outcome.audit.summary);
        }
        Command::Run(RecodeArgs { mode }) => {
            let summary = open_pipeline(config_path, *mode)?
                .run()
                .context("run pipeline")?;
            warn_failed_imputations(&summary);
            print_run(&summary);
        }
        Command::Tally(args) => {
            let snapshot = run_tally(config_path, args)?;
            print_tally(&snapshot, args.sentinels_only);
        }
        Command::Rules(RulesCommand::Check) => {
            let check = run_rules_check(config_path)?;
            print_rules_check(&check);
        }
        Command::Registry(RegistryCommand::Exclude(args)) => {
            let outcome = run_exclude(config_path, args)?;
            print_exclusions(&outcome);
        }
    }
    Ok(())
}

fn warn_failed_imputations(summary: &RunSummary) {
    let failed = summary
        .impute
        .audit
        .records
        .iter()
        .filter(|record| !record.outcome.is_completed())
        .count();
    if failed > 0 {
        warn!(failed, "run finished with unresolved imputation targets");
    }
}

fn run_tally(config_path: &Path, args: &TallyArgs) -> Result<TallySnapshot> {
    let stage = parse_stage(&args.artifact)?;
    open_pipeline(config_path, None)?
        .tally(stage)
        .with_context(|| format!("tally {stage}"))
}

fn run_rules_check(config_path: &Path) -> Result<RulesCheck> {
    let pipeline = open_pipeline(config_path, None)?;
    pipeline.check_rules().with_context(|| {
        format!(
            "check rule table {}",
            pipeline.config().rules_path().display()
        )
    })
}

fn run_exclude(config_path: &Path, args: &ExcludeArgs) -> Result<ExclusionOutcome> {
    let stage = parse_stage(&args.artifact)?;
    open_pipeline(config_path, None)?
        .exclude(stage)
        .context("apply exclusion rules")
}
