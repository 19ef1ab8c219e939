//! Missing-data taxonomy shared by every pipeline component.
//!
//! Every cell of every variable is classified into exactly one
//! [`ResponseCategory`]. Raw extracts carry sentinel codes (95, 97, 98, 99,
//! 9999999, ...) whose meaning is declared per variable by its recode rule;
//! recoded datasets carry an explicit marker string instead, so the reason a
//! value is absent survives the transformation.
//!
//! | Category | Marker in recoded data |
//! |---|---|
//! | `Substantive` | _(the value itself)_ |
//! | `ValidSkip` | `Valid Skip` |
//! | `RandomSkip` | `Random Skip` |
//! | `NotApplicable` | `Not Applicable` |
//! | `NoResponse` | `No Response` |
//! | `Missing` | _(empty cell)_ |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Classification of a single response cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    /// A real answer given by the respondent.
    Substantive,
    /// Not asked by design (questionnaire routing).
    ValidSkip,
    /// Not administered because of planned matrix/booklet sampling.
    RandomSkip,
    /// Structurally inapplicable to the respondent.
    NotApplicable,
    /// Asked but not answered, or answer indeterminate.
    #[serde(alias = "unknown")]
    NoResponse,
    /// Absent or empty cell.
    Missing,
}

impl ResponseCategory {
    /// All categories in reporting order.
    pub const ALL: [ResponseCategory; 6] = [
        ResponseCategory::Substantive,
        ResponseCategory::ValidSkip,
        ResponseCategory::RandomSkip,
        ResponseCategory::NotApplicable,
        ResponseCategory::NoResponse,
        ResponseCategory::Missing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Substantive => "substantive",
            Self::ValidSkip => "valid_skip",
            Self::RandomSkip => "random_skip",
            Self::NotApplicable => "not_applicable",
            Self::NoResponse => "no_response",
            Self::Missing => "missing",
        }
    }

    /// Marker written into recoded data for this category.
    ///
    /// `Substantive` and `Missing` have no marker: the former keeps its value,
    /// the latter stays an empty cell.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Self::ValidSkip => Some("Valid Skip"),
            Self::RandomSkip => Some("Random Skip"),
            Self::NotApplicable => Some("Not Applicable"),
            Self::NoResponse => Some("No Response"),
            Self::Substantive | Self::Missing => None,
        }
    }

    /// Recognize a marker string produced by a previous recode pass.
    pub fn from_marker(value: &str) -> Option<Self> {
        match value.trim() {
            "Valid Skip" => Some(Self::ValidSkip),
            "Random Skip" => Some(Self::RandomSkip),
            "Not Applicable" => Some(Self::NotApplicable),
            "No Response" => Some(Self::NoResponse),
            _ => None,
        }
    }

    /// True only for substantive answers; every other category is ineligible
    /// as imputation donor or straight-lining input.
    pub fn is_administered(&self) -> bool {
        matches!(self, Self::Substantive)
    }

    /// Classify a cell of an already recoded column.
    ///
    /// Empty cells are `Missing`, markers map to their category and anything
    /// else is a substantive value.
    pub fn of_recoded(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Missing,
            Some(text) => Self::from_marker(text).unwrap_or(Self::Substantive),
        }
    }
}

/// Free-function form of [`ResponseCategory::is_administered`].
pub fn is_administered(category: ResponseCategory) -> bool {
    category.is_administered()
}

impl fmt::Display for ResponseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResponseCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "substantive" => Ok(Self::Substantive),
            "valid_skip" => Ok(Self::ValidSkip),
            "random_skip" => Ok(Self::RandomSkip),
            "not_applicable" | "n/a" => Ok(Self::NotApplicable),
            "no_response" | "unknown" => Ok(Self::NoResponse),
            "missing" => Ok(Self::Missing),
            _ => Err(ModelError::UnknownCategory(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_round_trip() {
        for category in ResponseCategory::ALL {
            if let Some(marker) = category.marker() {
                assert_eq!(ResponseCategory::from_marker(marker), Some(category));
            }
        }
        assert_eq!(ResponseCategory::from_marker("Strongly agree"), None);
    }

    #[test]
    fn only_substantive_is_administered() {
        let administered: Vec<_> = ResponseCategory::ALL
            .into_iter()
            .filter(|c| is_administered(*c))
            .collect();
        assert_eq!(administered, vec![ResponseCategory::Substantive]);
    }

    #[test]
    fn recoded_cells_classify() {
        assert_eq!(ResponseCategory::of_recoded(None), ResponseCategory::Missing);
        assert_eq!(ResponseCategory::of_recoded(Some("  ")), ResponseCategory::Missing);
        assert_eq!(
            ResponseCategory::of_recoded(Some("Random Skip")),
            ResponseCategory::RandomSkip
        );
        assert_eq!(
            ResponseCategory::of_recoded(Some("Agree")),
            ResponseCategory::Substantive
        );
    }

    #[test]
    fn parses_category_names() {
        assert_eq!(
            "Valid skip".parse::<ResponseCategory>().unwrap(),
            ResponseCategory::ValidSkip
        );
        assert_eq!(
            "unknown".parse::<ResponseCategory>().unwrap(),
            ResponseCategory::NoResponse
        );
        assert!("refused".parse::<ResponseCategory>().is_err());
    }
}
