//! Project configuration (`survey.toml`).
//!
//! ```toml
//! [project]
//! work_dir = "work"
//! raw_input = "data/raw.csv"
//! registry = "data/registry.csv"
//! rules = "rules/recode.json"
//! id_column = "CNTSTUID"
//!
//! [recode]
//! mode = "strict"
//! rule_names = "original"
//!
//! [verify]
//! watched_sentinels = ["95", "97", "98", "99"]
//!
//! [[exclusions]]
//! name = "constant"
//! kind = "constant"
//!
//! [[imputations]]
//! target = "ST011Q01TA"
//! method = "mode"
//!
//! [[blocks]]
//! name = "teacher_support"
//! items = ["ST100Q01TA", "ST100Q02TA", "ST100Q03TA"]
//!
//! [[consistency]]
//! name = "closure"
//! event = "SC224Q01JA"
//! duration = "SC224Q02JA"
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use survey_impute::ImputationSpec;
use survey_map::ExclusionRule;
use survey_transform::RecodeMode;
use survey_validate::{ConsistencyCheck, ItemBlock};

use crate::error::{PipelineError, Result};

/// Default file name looked up by the CLI.
pub const CONFIG_FILE: &str = "survey.toml";

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_watched() -> Vec<String> {
    ["95", "97", "98", "99", "999", "99998", "9999999"]
        .iter()
        .map(|code| code.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    pub raw_input: PathBuf,
    pub registry: PathBuf,
    pub rules: PathBuf,
    #[serde(default)]
    pub id_column: Option<String>,
}

/// Which names the rule table is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleNames {
    /// Rules name the renamed variables.
    #[default]
    Renamed,
    /// Rules name the original codes and are rekeyed through the registry.
    Original,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecodeSection {
    #[serde(default)]
    pub mode: RecodeMode,
    #[serde(default)]
    pub rule_names: RuleNames,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySection {
    #[serde(default = "default_watched")]
    pub watched_sentinels: Vec<String>,
}

impl Default for VerifySection {
    fn default() -> Self {
        Self {
            watched_sentinels: default_watched(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    #[serde(default)]
    pub recode: RecodeSection,
    #[serde(default)]
    pub verify: VerifySection,
    #[serde(default)]
    pub exclusions: Vec<ExclusionRule>,
    #[serde(default)]
    pub imputations: Vec<ImputationSpec>,
    #[serde(default)]
    pub blocks: Vec<ItemBlock>,
    #[serde(default)]
    pub consistency: Vec<ConsistencyCheck>,
    /// Directory the config was loaded from.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl ProjectConfig {
    pub fn from_toml_str(contents: &str, base_dir: &Path) -> std::result::Result<Self, String> {
        let mut config: Self = toml::from_str(contents).map_err(|e| e.to_string())?;
        config.base_dir = base_dir.to_path_buf();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let config =
            Self::from_toml_str(&contents, &base_dir).map_err(|message| PipelineError::Config {
                path: path.to_path_buf(),
                message,
            })?;
        debug!(path = %path.display(), "loaded project config");
        Ok(config)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.resolve(&self.project.work_dir)
    }

    pub fn raw_input(&self) -> PathBuf {
        self.resolve(&self.project.raw_input)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.resolve(&self.project.registry)
    }

    pub fn rules_path(&self) -> PathBuf {
        self.resolve(&self.project.rules)
    }

    pub fn id_column(&self) -> Option<&str> {
        self.project.id_column.as_deref()
    }
}
