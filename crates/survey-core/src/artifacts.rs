//! Stage artifacts.
//!
//! Artifacts live in the work directory and are named by stage ordinal
//! (`01_raw.csv`, `02_renamed.csv`, ...). Each stage writes exactly one
//! dataset plus an optional `<artifact>.audit.json`. Every write goes through
//! a staging file and a rename, so a failing stage leaves earlier artifacts
//! untouched.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use survey_ingest::{read_dataset, staging_path, write_dataset};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Raw,
    Renamed,
    Recoded,
    Imputed,
    Flagged,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Raw,
        Stage::Renamed,
        Stage::Recoded,
        Stage::Imputed,
        Stage::Flagged,
    ];

    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Raw => 1,
            Self::Renamed => 2,
            Self::Recoded => 3,
            Self::Imputed => 4,
            Self::Flagged => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Renamed => "renamed",
            Self::Recoded => "recoded",
            Self::Imputed => "imputed",
            Self::Flagged => "flagged",
        }
    }

    /// Logical artifact name, e.g. `03_recoded`.
    pub fn artifact(&self) -> String {
        format!("{:02}_{}", self.ordinal(), self.as_str())
    }

    /// The stage whose artifact this stage consumes.
    pub fn input(&self) -> Option<Stage> {
        match self {
            Self::Raw => None,
            Self::Renamed => Some(Self::Raw),
            Self::Recoded => Some(Self::Renamed),
            Self::Imputed => Some(Self::Recoded),
            Self::Flagged => Some(Self::Imputed),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == value || stage.artifact() == value)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.artifact())
    }
}

/// A written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub sha256: String,
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dataset_path(&self, stage: Stage) -> PathBuf {
        self.dir.join(format!("{}.csv", stage.artifact()))
    }

    pub fn audit_path(&self, stage: Stage) -> PathBuf {
        self.dir.join(format!("{}.audit.json", stage.artifact()))
    }

    pub fn exists(&self, stage: Stage) -> bool {
        self.dataset_path(stage).is_file()
    }

    /// Read the artifact `consumer` depends on.
    pub fn read_input(&self, consumer: Stage, input: Stage) -> Result<DataFrame> {
        let path = self.dataset_path(input);
        if !path.is_file() {
            return Err(PipelineError::MissingArtifact {
                stage: consumer.artifact(),
                artifact: input.artifact(),
                path,
            });
        }
        Ok(read_dataset(&path)?)
    }

    pub fn read(&self, stage: Stage) -> Result<DataFrame> {
        self.read_input(stage, stage)
    }

    pub fn write(&self, stage: Stage, df: &DataFrame) -> Result<ArtifactInfo> {
        let path = self.dataset_path(stage);
        write_dataset(df, &path)?;
        let info = ArtifactInfo {
            name: stage.artifact(),
            sha256: file_sha256(&path)?,
            path,
            rows: df.height(),
            columns: df.width(),
        };
        debug!(artifact = %info.name, sha256 = %info.sha256, "wrote artifact");
        Ok(info)
    }

    /// Write a stage's audit document as pretty JSON.
    pub fn write_audit<T: Serialize>(&self, stage: Stage, audit: &T) -> Result<PathBuf> {
        let path = self.audit_path(stage);
        let mut json = serde_json::to_string_pretty(audit).map_err(|e| PipelineError::Write {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        json.push('\n');
        write_atomic(&path, json.as_bytes())?;
        Ok(path)
    }
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_error = |source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    let staging = staging_path(path);
    fs::write(&staging, bytes).map_err(write_error)?;
    fs::rename(&staging, path).map_err(write_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifacts_are_named_by_ordinal() {
        assert_eq!(Stage::Recoded.artifact(), "03_recoded");
        assert_eq!(Stage::Flagged.input(), Some(Stage::Imputed));
        assert_eq!(Stage::parse("02_renamed"), Some(Stage::Renamed));
        assert_eq!(Stage::parse("Imputed"), Some(Stage::Imputed));
        assert_eq!(Stage::parse("final"), None);
    }

    #[test]
    fn paths_live_in_work_dir() {
        let store = ArtifactStore::new("work");
        assert_eq!(store.dataset_path(Stage::Raw), Path::new("work/01_raw.csv"));
        assert_eq!(
            store.audit_path(Stage::Recoded),
            Path::new("work/03_recoded.audit.json")
        );
    }
}
