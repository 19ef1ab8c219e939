//! Variable mapping registry file.
//!
//! The registry is a CSV whose schema is shared by every stage. The columns in
//! [`REGISTRY_COLUMNS`] are interpreted; any other column (cross-framework
//! labels, analyst notes) is preserved verbatim and written back in its
//! original position after the known columns.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, warn};

use survey_model::{DataSource, VariableMappingEntry, VariableStatus};

use crate::csv_table::staging_path;
use crate::error::{IngestError, Result};

pub const ORIGINAL_NAME: &str = "original_variable_name";
pub const RENAMED_NAME: &str = "renamed_variable";
pub const DESCRIPTION: &str = "variable_description";
pub const DATA_SOURCE: &str = "data_source";
pub const STATUS: &str = "status";
pub const STATUS_PRIORITY: &str = "status_priority";
pub const STATUS_REASON: &str = "status_reason";
pub const PISA_DOMAIN: &str = "pisa_domain";
pub const PISA_ICT_SCHOOL_DOMAIN: &str = "pisa_ict_school_domain";
pub const PISA_ICT_HOME_DOMAIN: &str = "pisa_ict_home_domain";

/// Interpreted registry columns, in output order.
pub const REGISTRY_COLUMNS: [&str; 10] = [
    ORIGINAL_NAME,
    RENAMED_NAME,
    DESCRIPTION,
    DATA_SOURCE,
    STATUS,
    STATUS_PRIORITY,
    STATUS_REASON,
    PISA_DOMAIN,
    PISA_ICT_SCHOOL_DOMAIN,
    PISA_ICT_HOME_DOMAIN,
];

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn csv_error(path: &Path, error: &csv::Error) -> IngestError {
    IngestError::CsvParse {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/// Read all registry entries in file order.
pub fn read_registry(path: &Path) -> Result<Vec<VariableMappingEntry>> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, &e))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, &e))?
        .iter()
        .map(|h| h.trim().trim_matches('\u{feff}').to_string())
        .collect();
    let index: BTreeMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    if !index.contains_key(ORIGINAL_NAME) {
        return Err(IngestError::MissingColumn {
            column: ORIGINAL_NAME.to_string(),
            path: path.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, &e))?;
        let line = record.position().map_or(0, csv::Position::line);
        let field = |name: &str| index.get(name).and_then(|idx| record.get(*idx));

        let Some(original_name) = non_empty(field(ORIGINAL_NAME)) else {
            warn!(path = %path.display(), line, "skipping registry row without original name");
            continue;
        };
        let status_text = field(STATUS).unwrap_or("");
        let status: VariableStatus =
            status_text
                .parse()
                .map_err(|_| IngestError::InvalidValue {
                    field: STATUS.to_string(),
                    value: status_text.to_string(),
                    path: path.to_path_buf(),
                    line,
                })?;

        let extra = headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !REGISTRY_COLUMNS.contains(&name.as_str()))
            .map(|(idx, name)| (name.clone(), record.get(idx).unwrap_or("").to_string()))
            .collect();

        entries.push(VariableMappingEntry {
            original_name,
            renamed_name: non_empty(field(RENAMED_NAME)),
            description: field(DESCRIPTION).unwrap_or("").trim().to_string(),
            data_source: DataSource::parse_lenient(field(DATA_SOURCE).unwrap_or("")),
            status,
            status_priority: non_empty(field(STATUS_PRIORITY)),
            status_reason: non_empty(field(STATUS_REASON)),
            pisa_domain: non_empty(field(PISA_DOMAIN)),
            pisa_ict_school_domain: non_empty(field(PISA_ICT_SCHOOL_DOMAIN)),
            pisa_ict_home_domain: non_empty(field(PISA_ICT_HOME_DOMAIN)),
            extra,
        });
    }
    debug!(path = %path.display(), entries = entries.len(), "read registry");
    Ok(entries)
}

/// Extra column names across all entries, in first-seen order.
fn extra_columns(entries: &[VariableMappingEntry]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        for (name, _) in &entry.extra {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

fn entry_record(entry: &VariableMappingEntry, extras: &[String]) -> StringRecord {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    let mut record = StringRecord::new();
    record.push_field(&entry.original_name);
    record.push_field(&opt(&entry.renamed_name));
    record.push_field(&entry.description);
    record.push_field(entry.data_source.as_str());
    record.push_field(entry.status.as_str());
    record.push_field(&opt(&entry.status_priority));
    record.push_field(&opt(&entry.status_reason));
    record.push_field(&opt(&entry.pisa_domain));
    record.push_field(&opt(&entry.pisa_ict_school_domain));
    record.push_field(&opt(&entry.pisa_ict_home_domain));
    for name in extras {
        let value = entry
            .extra
            .iter()
            .find(|(key, _)| key == name)
            .map_or("", |(_, value)| value.as_str());
        record.push_field(value);
    }
    record
}

/// Persist the registry, atomically replacing `path`.
pub fn write_registry(path: &Path, entries: &[VariableMappingEntry]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| IngestError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let extras = extra_columns(entries);
    let staging = staging_path(path);
    {
        let mut writer = WriterBuilder::new()
            .from_path(&staging)
            .map_err(|e| csv_error(&staging, &e))?;
        let header: Vec<&str> = REGISTRY_COLUMNS
            .iter()
            .copied()
            .chain(extras.iter().map(String::as_str))
            .collect();
        writer
            .write_record(&header)
            .map_err(|e| csv_error(&staging, &e))?;
        for entry in entries {
            writer
                .write_record(&entry_record(entry, &extras))
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
    debug!(path = %path.display(), entries = entries.len(), "wrote registry");
    Ok(())
}
