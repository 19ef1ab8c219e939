//! CLI argument definitions for the survey recoding pipeline.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "survey-recode",
    version,
    about = "Recode, impute and quality-flag survey extracts",
    long_about = "Run the survey recoding pipeline stage by stage.\n\n\
                  Stages read and write numbered artifacts in the project's work directory:\n\
                  01_raw, 02_renamed, 03_recoded, 04_imputed, 05_flagged."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Project configuration file.
    #[arg(long = "config", value_name = "PATH", default_value = "survey.toml", global = true)]
    pub config: PathBuf,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow respondent values in trace-level logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Copy the raw extract into the work directory (01_raw).
    Ingest,

    /// Apply the registry rename plan and drop excluded variables (02_renamed).
    Rename,

    /// Recode sentinel codes and labels (03_recoded).
    Recode(RecodeArgs),

    /// Impute designated variables (04_imputed).
    Impute,

    /// Append response-quality flags (05_flagged).
    Flag,

    /// Run every stage in order.
    Run(RecodeArgs),

    /// Tally response categories of an existing artifact.
    Tally(TallyArgs),

    /// Rule table maintenance.
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Variable registry maintenance.
    #[command(subcommand)]
    Registry(RegistryCommand),
}

#[derive(Args)]
pub struct RecodeArgs {
    /// Override the configured recode mode.
    #[arg(long = "mode", value_enum)]
    pub mode: Option<RecodeModeArg>,
}

#[derive(Args)]
pub struct TallyArgs {
    /// Artifact to tally (01_raw .. 05_flagged, or a stage name).
    #[arg(value_name = "ARTIFACT")]
    pub artifact: String,

    /// Show only variables with at least one watched sentinel code.
    #[arg(long = "sentinels-only")]
    pub sentinels_only: bool,
}

#[derive(Subcommand)]
pub enum RulesCommand {
    /// Validate the rule table and report sentinel codes with several meanings.
    Check,
}

#[derive(Subcommand)]
pub enum RegistryCommand {
    /// Evaluate exclusion rules and persist the updated registry.
    Exclude(ExcludeArgs),
}

#[derive(Args)]
pub struct ExcludeArgs {
    /// Artifact the exclusion rules are evaluated on.
    #[arg(long = "artifact", value_name = "ARTIFACT", default_value = "03_recoded")]
    pub artifact: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RecodeModeArg {
    Strict,
    Permissive,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "survey-recode",
            "recode",
            "--mode",
            "strict",
            "--config",
            "study/survey.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("study/survey.toml"));
        assert!(matches!(
            cli.command,
            Command::Recode(RecodeArgs {
                mode: Some(RecodeModeArg::Strict)
            })
        ));
    }

    #[test]
    fn registry_exclude_defaults_to_recoded_artifact() {
        let cli = Cli::try_parse_from(["survey-recode", "registry", "exclude"]).unwrap();
        let Command::Registry(RegistryCommand::Exclude(args)) = cli.command else {
            panic!("expected registry exclude");
        };
        assert_eq!(args.artifact, "03_recoded");
        assert_eq!(cli.config, PathBuf::from("survey.toml"));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["survey-recode", "publish"]).is_err());
    }
}
