//! The variable mapping registry.
//!
//! The registry is the source of truth for renaming and inclusion decisions.
//! Only [`VariableRegistry::bulk_update`] changes an entry's status, and every
//! disagreement between two updates is kept as a [`RegistryConflict`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use survey_ingest::{read_registry, write_registry};
use survey_model::{StatusInfo, VariableMappingEntry, VariableStatus};

use crate::error::{RegistryError, Result};

/// Two status updates disagreed on one variable; the later one won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryConflict {
    pub variable: String,
    pub previous_rule: String,
    pub previous_status: VariableStatus,
    pub rule: String,
    pub status: VariableStatus,
}

/// Outcome of one `bulk_update` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub rule: String,
    /// Entries matched by the predicate.
    pub matched: usize,
    /// Entries whose status actually changed.
    pub changed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    entries: Vec<VariableMappingEntry>,
    by_original: BTreeMap<String, usize>,
    by_renamed: BTreeMap<String, usize>,
    assigned_by: BTreeMap<usize, (String, VariableStatus)>,
    conflicts: Vec<RegistryConflict>,
}

impl VariableRegistry {
    /// Build a registry, rejecting repeated original names and two rows that
    /// resolve to the same renamed name.
    pub fn new(entries: Vec<VariableMappingEntry>) -> Result<Self> {
        let mut by_original = BTreeMap::new();
        let mut by_renamed: BTreeMap<String, usize> = BTreeMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let original = entry.original_name.trim().to_string();
            if by_original.insert(original.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateOriginal(original));
            }
            let renamed = entry.effective_name().trim().to_string();
            if let Some(first) = by_renamed.get(&renamed) {
                return Err(RegistryError::DuplicateRename {
                    renamed,
                    first: entries[*first].original_name.trim().to_string(),
                    second: original,
                });
            }
            by_renamed.insert(renamed, idx);
        }
        Ok(Self {
            entries,
            by_original,
            by_renamed,
            ..Self::default()
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let registry = Self::new(read_registry(path)?)?;
        info!(
            path = %path.display(),
            entries = registry.len(),
            excluded = registry.excluded_count(),
            "loaded registry"
        );
        Ok(registry)
    }

    /// Persist the registry as the new source of truth.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_registry(path, &self.entries)?;
        Ok(())
    }

    pub fn entries(&self) -> &[VariableMappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn excluded_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_included()).count()
    }

    pub fn conflicts(&self) -> &[RegistryConflict] {
        &self.conflicts
    }

    pub fn entry(&self, original_name: &str) -> Option<&VariableMappingEntry> {
        self.by_original
            .get(original_name.trim())
            .map(|idx| &self.entries[*idx])
    }

    /// Entry addressed by its renamed name, falling back to the original name.
    pub fn entry_by_name(&self, name: &str) -> Option<&VariableMappingEntry> {
        let name = name.trim();
        self.by_renamed
            .get(name)
            .or_else(|| self.by_original.get(name))
            .map(|idx| &self.entries[*idx])
    }

    /// Renamed name for an original variable; unknown names resolve to themselves.
    pub fn resolve<'a>(&'a self, original_name: &'a str) -> &'a str {
        match self.entry(original_name) {
            Some(entry) => entry.effective_name(),
            None => original_name.trim(),
        }
    }

    /// Inclusion status of a variable. Variables the registry does not list
    /// are included.
    pub fn lookup_status(&self, name: &str) -> StatusInfo {
        match self.entry_by_name(name) {
            Some(entry) => StatusInfo {
                status: entry.status,
                reason: entry.status_reason.clone(),
                priority: entry.status_priority.clone(),
            },
            None => StatusInfo {
                status: VariableStatus::Included,
                reason: None,
                priority: None,
            },
        }
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.lookup_status(name).status == VariableStatus::Included
    }

    /// Set `status` and `reason` on every entry matched by `predicate`.
    ///
    /// Updates are last-writer-wins. When an entry was already assigned a
    /// different status by an earlier rule, the disagreement is logged and
    /// recorded in [`Self::conflicts`].
    pub fn bulk_update<F>(
        &mut self,
        rule: &str,
        predicate: F,
        status: VariableStatus,
        reason: Option<&str>,
    ) -> UpdateSummary
    where
        F: Fn(&VariableMappingEntry) -> bool,
    {
        let mut summary = UpdateSummary {
            rule: rule.to_string(),
            matched: 0,
            changed: 0,
        };
        for (idx, entry) in self.entries.iter_mut().enumerate() {
            if !predicate(entry) {
                continue;
            }
            summary.matched += 1;
            if let Some((previous_rule, previous_status)) = self.assigned_by.get(&idx)
                && *previous_status != status
            {
                warn!(
                    variable = %entry.original_name,
                    previous_rule = %previous_rule,
                    previous_status = %previous_status,
                    rule,
                    status = %status,
                    "registry status conflict, later rule wins"
                );
                self.conflicts.push(RegistryConflict {
                    variable: entry.original_name.clone(),
                    previous_rule: previous_rule.clone(),
                    previous_status: *previous_status,
                    rule: rule.to_string(),
                    status,
                });
            }
            if entry.status != status {
                summary.changed += 1;
            }
            entry.status = status;
            entry.status_reason = reason.map(str::to_string);
            self.assigned_by.insert(idx, (rule.to_string(), status));
        }
        debug!(
            rule,
            matched = summary.matched,
            changed = summary.changed,
            "bulk status update"
        );
        summary
    }
}
