use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::household::{HouseholdRole, TaskCategory};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RedistributionQuality {
    None,
    Moderate,
    Significant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Minimal,
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            ImpactLevel::High
        } else if score >= 40.0 {
            ImpactLevel::Medium
        } else if score >= 20.0 {
            ImpactLevel::Low
        } else {
            ImpactLevel::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Minimal => "minimal",
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetrics {
    pub before_distribution: BTreeMap<HouseholdRole, f64>,
    pub after_distribution: BTreeMap<HouseholdRole, f64>,
    pub changes: BTreeMap<HouseholdRole, f64>,
    pub absolute_change: f64,
    pub redistribution_occurred: bool,
    pub redistribution_quality: RedistributionQuality,
    pub balance_improved: bool,
    pub imbalance_reduction: f64,
    pub final_imbalance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessRecord {
    pub question_id: String,
    pub question_text: String,
    pub category: TaskCategory,
    pub survey_response: HouseholdRole,
    pub change_metrics: ChangeMetrics,
    pub effectiveness_score: f64,
    pub impact: ImpactLevel,
    pub behavior_change: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEffectiveness {
    pub total: u32,
    pub effective: u32,
    pub average_score: f64,
    pub effectiveness_rate: f64,
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeywordFrequency {
    pub word: String,
    /// Share of questions in the bucket mentioning the word, whole percent.
    pub frequency: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionCharacteristics {
    pub question_count: usize,
    pub average_text_length: f64,
    pub categories: BTreeMap<TaskCategory, u32>,
    pub top_keywords: Vec<KeywordFrequency>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessPatterns {
    pub high_impact_questions: Vec<String>,
    pub low_impact_questions: Vec<String>,
    pub high_impact_characteristics: Option<QuestionCharacteristics>,
    pub low_impact_characteristics: Option<QuestionCharacteristics>,
    pub distinguishing_keywords: Vec<String>,
    pub category_effectiveness: BTreeMap<TaskCategory, CategoryEffectiveness>,
    pub response_type_effectiveness: BTreeMap<HouseholdRole, Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub question_id: String,
    pub text: String,
    pub score: f64,
    pub impact: ImpactLevel,
    pub category: TaskCategory,
    pub change_achieved: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectivenessInsightKind {
    Overall,
    Category,
    Pattern,
    Behavior,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InsightTone {
    Positive,
    Moderate,
    Concern,
    Informative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessInsight {
    pub kind: EffectivenessInsightKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TaskCategory>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effectiveness_rate: Option<f64>,
    pub tone: InsightTone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImpactTrend {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverallImpact {
    pub total_imbalance_reduction: f64,
    pub categories_improved: u32,
    pub categories_worsened: u32,
    pub net_improvement: i32,
    pub overall_trend: ImpactTrend,
}

impl Default for OverallImpact {
    fn default() -> Self {
        Self {
            total_imbalance_reduction: 0.0,
            categories_improved: 0,
            categories_worsened: 0,
            net_improvement: 0,
            overall_trend: ImpactTrend::Neutral,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessAnalysis {
    pub family_id: String,
    pub survey_id: String,
    pub question_effectiveness: BTreeMap<String, EffectivenessRecord>,
    pub patterns: EffectivenessPatterns,
    pub top_performers: Vec<TopPerformer>,
    pub insights: Vec<EffectivenessInsight>,
    pub overall_impact: OverallImpact,
}

/// Persisted form, keyed by family and survey.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredEffectivenessAnalysis {
    pub family_id: String,
    pub survey_id: String,
    pub question_effectiveness: BTreeMap<String, EffectivenessRecord>,
    pub patterns: EffectivenessPatterns,
    pub overall_impact: OverallImpact,
    pub analysis_date: DateTime<Utc>,
}
