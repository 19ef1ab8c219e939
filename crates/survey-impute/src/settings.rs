//! Declared imputation settings.

use serde::{Deserialize, Serialize};

use survey_model::ResponseCategory;

fn default_draws() -> usize {
    5
}

fn default_donors() -> usize {
    5
}

fn default_seed() -> u64 {
    1
}

fn default_min_coverage() -> f64 {
    0.5
}

fn default_min_valid() -> usize {
    3
}

fn default_fill_categories() -> Vec<ResponseCategory> {
    vec![ResponseCategory::Missing, ResponseCategory::NoResponse]
}

/// Predictive mean matching settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmmSettings {
    pub predictors: Vec<String>,
    /// Number of imputation draws.
    #[serde(default = "default_draws")]
    pub draws: usize,
    /// Donor pool size per missing cell.
    #[serde(default = "default_donors")]
    pub donors: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Draw whose values are written back.
    #[serde(default)]
    pub selected_draw: usize,
    /// Minimum share of rows a predictor must cover.
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
}

impl PmmSettings {
    pub fn new(predictors: Vec<String>) -> Self {
        Self {
            predictors,
            draws: default_draws(),
            donors: default_donors(),
            seed: default_seed(),
            selected_draw: 0,
            min_coverage: default_min_coverage(),
        }
    }
}

/// Rule-based fill over a set of related items.
///
/// When at least `min_valid` items hold a substantive value and every one of
/// them equals `least_severe`, the target becomes `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalSettings {
    pub items: Vec<String>,
    pub least_severe: String,
    #[serde(default = "default_min_valid")]
    pub min_valid: usize,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ImputationMethod {
    PredictiveMeanMatching(PmmSettings),
    Mode,
    Conditional(ConditionalSettings),
}

impl ImputationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PredictiveMeanMatching(_) => "predictive_mean_matching",
            Self::Mode => "mode",
            Self::Conditional(_) => "conditional",
        }
    }

    pub fn predictors(&self) -> Vec<String> {
        match self {
            Self::PredictiveMeanMatching(settings) => settings.predictors.clone(),
            Self::Mode => Vec::new(),
            Self::Conditional(settings) => settings.items.clone(),
        }
    }
}

/// One designated imputation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationSpec {
    pub target: String,
    #[serde(flatten)]
    pub method: ImputationMethod,
    /// Buckets eligible for filling. Anything else is never modified.
    #[serde(default = "default_fill_categories")]
    pub fill_categories: Vec<ResponseCategory>,
}

impl ImputationSpec {
    pub fn new(target: impl Into<String>, method: ImputationMethod) -> Self {
        Self {
            target: target.into(),
            method,
            fill_categories: default_fill_categories(),
        }
    }

    pub fn with_fill_categories(mut self, categories: Vec<ResponseCategory>) -> Self {
        self.fill_categories = categories;
        self
    }

    /// Whether a cell of the target may be filled.
    pub fn fills(&self, value: Option<&str>) -> bool {
        let category = ResponseCategory::of_recoded(value);
        category != ResponseCategory::Substantive && self.fill_categories.contains(&category)
    }
}
