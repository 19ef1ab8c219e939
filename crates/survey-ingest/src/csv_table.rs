//! CSV dataset artifacts.
//!
//! Every column is read as text; empty cells become nulls. Writing goes
//! through a temporary sibling file and an atomic rename, so a failing stage
//! never leaves a half-written artifact behind.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use polars::prelude::DataFrame;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::polars_utils::{column_names, column_values, frame_from_columns};

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    let mut parts = trimmed.split_whitespace();
    let mut normalized = String::new();
    if let Some(first) = parts.next() {
        normalized.push_str(first);
        for part in parts {
            normalized.push(' ');
            normalized.push_str(part);
        }
    }
    normalized
}

fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn csv_error(path: &Path, error: &csv::Error) -> IngestError {
    IngestError::CsvParse {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/// Read a CSV dataset into an all-text frame.
pub fn read_dataset(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| csv_error(path, &e))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, &e))?
        .iter()
        .map(normalize_header)
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(IngestError::EmptyCsv {
            path: path.to_path_buf(),
        });
    }
    let mut seen = BTreeSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(IngestError::DuplicateColumn {
                column: header.clone(),
                path: path.to_path_buf(),
            });
        }
    }

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, &e))?;
        for (idx, column) in columns.iter_mut().enumerate() {
            column.push(record.get(idx).and_then(normalize_cell));
        }
    }
    let rows = columns.first().map_or(0, Vec::len);
    debug!(
        path = %path.display(),
        rows,
        columns = headers.len(),
        "read dataset"
    );
    frame_from_columns(headers.into_iter().zip(columns).collect())
}

/// Temporary sibling used for atomic writes.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Write an all-text frame as CSV, atomically replacing `path`.
///
/// Output is a pure function of the frame: column order, row order and
/// quoting never depend on anything else.
pub fn write_dataset(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| IngestError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let names = column_names(df);
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        columns.push(column_values(df, name)?);
    }

    let staging = staging_path(path);
    {
        let mut writer = WriterBuilder::new()
            .from_path(&staging)
            .map_err(|e| csv_error(&staging, &e))?;
        writer
            .write_record(&names)
            .map_err(|e| csv_error(&staging, &e))?;
        for row in 0..df.height() {
            let record: Vec<&str> = columns
                .iter()
                .map(|column| column[row].as_deref().unwrap_or(""))
                .collect();
            writer
                .write_record(&record)
                .map_err(|e| csv_error(&staging, &e))?;
        }
        writer.flush().map_err(|source| IngestError::FileWrite {
            path: staging.clone(),
            source,
        })?;
    }
    fs::rename(&staging, path).map_err(|source| IngestError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), rows = df.height(), "wrote dataset");
    Ok(())
}
