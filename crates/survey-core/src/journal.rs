//! Run journal.
//!
//! `journal.json` in the work directory is an append-only list of stage runs.
//! It is the only place wall-clock time is recorded; artifacts themselves
//! stay byte-identical across re-runs, which the recorded digests make
//! checkable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactInfo, write_atomic};
use crate::error::{PipelineError, Result};

pub const JOURNAL_FILE: &str = "journal.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub stage: String,
    pub ordinal: u8,
    pub inputs: Vec<String>,
    pub output: String,
    pub rows: usize,
    pub columns: usize,
    pub sha256: String,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn path(work_dir: &Path) -> PathBuf {
        work_dir.join(JOURNAL_FILE)
    }

    /// Load the journal; a missing file is an empty journal.
    pub fn load(work_dir: &Path) -> Result<Self> {
        let path = Self::path(work_dir);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path).map_err(|e| PipelineError::Journal {
            path: path.clone(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|e| PipelineError::Journal {
            path,
            message: e.to_string(),
        })
    }

    pub fn save(&self, work_dir: &Path) -> Result<()> {
        let path = Self::path(work_dir);
        let json = serde_json::to_string_pretty(self).map_err(|e| PipelineError::Journal {
            path: path.clone(),
            message: e.to_string(),
        })?;
        write_atomic(&path, json.as_bytes())
    }

    pub fn record(
        &mut self,
        stage: &str,
        ordinal: u8,
        inputs: Vec<String>,
        artifact: &ArtifactInfo,
    ) {
        self.entries.push(JournalEntry {
            stage: stage.to_string(),
            ordinal,
            inputs,
            output: artifact.name.clone(),
            rows: artifact.rows,
            columns: artifact.columns,
            sha256: artifact.sha256.clone(),
            recorded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
    }

    /// Most recent entry producing `output`.
    pub fn latest(&self, output: &str) -> Option<&JournalEntry> {
        self.entries.iter().rev().find(|entry| entry.output == output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(sha: &str) -> ArtifactInfo {
        ArtifactInfo {
            name: "03_recoded".to_string(),
            path: PathBuf::from("work/03_recoded.csv"),
            rows: 10,
            columns: 4,
            sha256: sha.to_string(),
        }
    }

    #[test]
    fn latest_entry_wins() {
        let mut journal = Journal::default();
        journal.record("recode", 3, vec!["02_renamed".to_string()], &artifact("aa"));
        journal.record("recode", 3, vec!["02_renamed".to_string()], &artifact("bb"));
        assert_eq!(journal.entries.len(), 2);
        assert_eq!(journal.latest("03_recoded").unwrap().sha256, "bb");
        assert!(journal.latest("04_imputed").is_none());
    }
}
