use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::aggregate::DateRange;
use crate::models::household::{HouseholdRole, PrimaryDoer, TaskCategory};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleShareSummary {
    pub count: u64,
    pub weight: f64,
    /// One-decimal formatted share, e.g. `"80.0"`.
    pub percentage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationEntry {
    pub question_id: String,
    #[serde(default)]
    pub question_text: String,
    pub category: TaskCategory,
    pub survey_answer: HouseholdRole,
    pub actual_primary_doer: PrimaryDoer,
    pub is_match: bool,
    pub percentages: BTreeMap<HouseholdRole, RoleShareSummary>,
}

impl CorrelationEntry {
    pub fn percentage_of(&self, role: &HouseholdRole) -> f64 {
        self.percentages
            .get(role)
            .and_then(|share| share.percentage.parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    /// Highest share held by any single role.
    pub fn dominant_share(&self) -> f64 {
        self.percentages
            .values()
            .filter_map(|share| share.percentage.parse::<f64>().ok())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAnalysis {
    pub matches: u32,
    pub total: u32,
    pub survey_tendency: BTreeMap<HouseholdRole, u32>,
    pub actual_tendency: BTreeMap<HouseholdRole, u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationAccuracy {
    pub overall: f64,
    pub by_category: BTreeMap<TaskCategory, f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Positive,
    Neutral,
    Concern,
    Imbalance,
    HiddenWork,
    PerceptionGap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub kind: InsightKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TaskCategory>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perception: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    pub impact: Priority,
}

impl Insight {
    pub fn new(kind: InsightKind, message: impl Into<String>, impact: Priority) -> Self {
        Self {
            kind,
            category: None,
            message: message.into(),
            accuracy: None,
            perception: None,
            reality: None,
            gap: None,
            impact,
        }
    }

    pub fn for_category(mut self, category: TaskCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TaskCategory>,
    pub action: String,
    pub reason: String,
}

/// Append-only result of one survey-versus-behavior comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationSnapshot {
    pub id: String,
    pub family_id: String,
    pub timestamp: DateTime<Utc>,
    pub survey_response_count: usize,
    pub task_completion_count: u64,
    pub date_range: DateRange,
    pub accuracy: CorrelationAccuracy,
    pub matches: Vec<CorrelationEntry>,
    pub mismatches: Vec<CorrelationEntry>,
    pub category_analysis: BTreeMap<TaskCategory, CategoryAnalysis>,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
}
