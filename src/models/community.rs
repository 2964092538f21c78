use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::household::TaskCategory;

/// Coarse accuracy band shared with other families instead of the raw value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccuracyRange {
    #[serde(rename = "0-40")]
    Low,
    #[serde(rename = "40-60")]
    Developing,
    #[serde(rename = "60-80")]
    Good,
    #[serde(rename = "80-100")]
    Excellent,
}

impl AccuracyRange {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 80.0 {
            AccuracyRange::Excellent
        } else if accuracy >= 60.0 {
            AccuracyRange::Good
        } else if accuracy >= 40.0 {
            AccuracyRange::Developing
        } else {
            AccuracyRange::Low
        }
    }
}

/// Per-family patterns stripped of anything that identifies the family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizedContribution {
    pub anonymous_id: String,
    pub accuracy_range: AccuracyRange,
    pub maturity_level: u8,
    pub excluded_topics: Vec<String>,
    pub reframing_categories: Vec<TaskCategory>,
    pub contributed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommunityInsights {
    pub family_count: usize,
    pub accuracy_distribution: BTreeMap<AccuracyRange, usize>,
    /// Topics excluded by at least one family, with the number of families.
    pub common_exclusions: BTreeMap<String, usize>,
    pub reframing_hotspots: BTreeMap<TaskCategory, usize>,
    pub average_maturity_level: f64,
}
