//! Declarative recode rule tables.
//!
//! A rule table is JSON. Near-identical rules collapse into one entry naming
//! many variables, and sentinel maps and level sets are shared by name:
//!
//! ```json
//! {
//!   "profiles": { "standard": { "95": "valid_skip", "97": "random_skip", "99": "no_response" } },
//!   "scales": {
//!     "agreement": { "ordered": true, "levels": [
//!       { "code": "1", "label": "Strongly disagree" },
//!       { "code": "4", "label": "Strongly agree" }
//!     ] }
//!   },
//!   "rules": [
//!     { "variables": ["ST034Q01TA", "ST034Q02TA"], "profile": "standard", "scale": "agreement" },
//!     { "variable": "ST004D01T", "sentinels": { "7": "missing" },
//!       "levels": { "levels": [ { "code": "1", "label": "Female" }, { "code": "2", "label": "Male" } ] } },
//!     { "variable": "AGE", "kind": "numeric", "profile": "standard", "range": { "min": 15, "max": 17 } }
//!   ]
//! }
//! ```
//!
//! Expansion yields exactly one [`RecodeRule`] per variable. Entry-level
//! `sentinels` override the profile code by code.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use survey_model::{
    CodeRange, Level, LevelMap, RecodeRule, ResponseCategory, VariableKind, normalize_code,
};

use crate::checks::validate_rule;
use crate::error::RuleError;

type SentinelMap = BTreeMap<String, ResponseCategory>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleTableFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, SentinelMap>,
    #[serde(default)]
    pub scales: BTreeMap<String, LevelMap>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// One entry of the rule file; may cover many variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleEntry {
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub kind: VariableKind,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub sentinels: SentinelMap,
    #[serde(default)]
    pub scale: Option<String>,
    #[serde(default)]
    pub levels: Option<LevelMap>,
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
    #[serde(default)]
    pub range: Option<CodeRange>,
}

impl RuleEntry {
    fn variable_names(&self) -> Vec<String> {
        self.variable
            .iter()
            .chain(self.variables.iter())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

fn code(raw: &str) -> String {
    normalize_code(raw).unwrap_or_else(|| raw.trim().to_string())
}

fn normalized_levels(levels: &LevelMap) -> LevelMap {
    LevelMap {
        ordered: levels.ordered,
        levels: levels
            .levels
            .iter()
            .map(|level| Level {
                code: code(&level.code),
                label: level.label.trim().to_string(),
            })
            .collect(),
    }
}

/// Validated rules keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    rules: BTreeMap<String, RecodeRule>,
}

impl RuleTable {
    /// Build a table from individual rules, validating each one.
    pub fn from_rules(rules: impl IntoIterator<Item = RecodeRule>) -> Result<Self, RuleError> {
        let mut table = BTreeMap::new();
        for rule in rules {
            validate_rule(&rule)?;
            let variable = rule.variable.clone();
            if table.insert(variable.clone(), rule).is_some() {
                return Err(RuleError::DuplicateRule { variable });
            }
        }
        Ok(Self { rules: table })
    }

    pub fn from_file_contents(file: &RuleTableFile) -> Result<Self, RuleError> {
        let mut rules = Vec::new();
        for (idx, entry) in file.rules.iter().enumerate() {
            let names = entry.variable_names();
            if names.is_empty() {
                return Err(RuleError::Invalid {
                    variable: format!("rules[{idx}]"),
                    message: "entry names no variables".to_string(),
                });
            }
            for variable in names {
                rules.push(expand_entry(file, entry, variable)?);
            }
        }
        Self::from_rules(rules)
    }

    pub fn from_json_str(json: &str) -> Result<Self, RuleError> {
        let file: RuleTableFile =
            serde_json::from_str(json).map_err(|e| RuleError::Parse(e.to_string()))?;
        Self::from_file_contents(&file)
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let contents = fs::read_to_string(path).map_err(|source| RuleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_json_str(&contents)?;
        debug!(path = %path.display(), rules = table.len(), "loaded rule table");
        Ok(table)
    }

    /// Rekey every rule through `rename`, e.g. from original to renamed names.
    pub fn rekeyed<F>(self, rename: F) -> Result<Self, RuleError>
    where
        F: Fn(&str) -> String,
    {
        let rules = self.rules.into_values().map(|mut rule| {
            rule.variable = rename(&rule.variable);
            rule
        });
        Self::from_rules(rules)
    }

    pub fn get(&self, variable: &str) -> Option<&RecodeRule> {
        self.rules.get(variable)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.rules.contains_key(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecodeRule> {
        self.rules.values()
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn expand_entry(
    file: &RuleTableFile,
    entry: &RuleEntry,
    variable: String,
) -> Result<RecodeRule, RuleError> {
    let mut sentinels = SentinelMap::new();
    if let Some(profile) = &entry.profile {
        let map = file
            .profiles
            .get(profile)
            .ok_or_else(|| RuleError::UnknownProfile {
                variable: variable.clone(),
                profile: profile.clone(),
            })?;
        sentinels.extend(map.iter().map(|(raw, category)| (code(raw), *category)));
    }
    sentinels.extend(
        entry
            .sentinels
            .iter()
            .map(|(raw, category)| (code(raw), *category)),
    );

    let levels = match (&entry.scale, &entry.levels) {
        (Some(_), Some(_)) => {
            return Err(RuleError::Invalid {
                variable,
                message: "both 'scale' and 'levels' given".to_string(),
            });
        }
        (Some(scale), None) => Some(normalized_levels(file.scales.get(scale).ok_or_else(
            || RuleError::UnknownScale {
                variable: variable.clone(),
                scale: scale.clone(),
            },
        )?)),
        (None, Some(levels)) => Some(normalized_levels(levels)),
        (None, None) => None,
    };
    if entry.kind == VariableKind::Numeric && levels.is_some() {
        return Err(RuleError::Invalid {
            variable,
            message: "numeric variables take no level map".to_string(),
        });
    }

    Ok(RecodeRule {
        variable,
        kind: entry.kind,
        sentinels,
        levels,
        custom: entry
            .custom
            .iter()
            .map(|(from, to)| (code(from), code(to)))
            .collect(),
        range: entry.range,
    })
}
