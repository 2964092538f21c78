use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CORRELATION_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryPreference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicability_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    pub should_emphasize: bool,
    pub should_deemphasize: bool,
    pub needs_reframing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accuracy: Option<f64>,
}

impl CategoryPreference {
    /// Field-level merge: values present in `other` win, absent ones keep
    /// what is stored. `needs_reframing` is sticky once raised.
    fn merge(&mut self, other: &CategoryPreference) {
        if other.applicability_rate.is_some() {
            self.applicability_rate = other.applicability_rate;
            self.should_emphasize = other.should_emphasize;
            self.should_deemphasize = other.should_deemphasize;
        }
        if other.total_questions.is_some() {
            self.total_questions = other.total_questions;
        }
        if other.last_accuracy.is_some() {
            self.last_accuracy = other.last_accuracy;
        }
        self.needs_reframing |= other.needs_reframing;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationHistoryEntry {
    pub date: DateTime<Utc>,
    pub overall_accuracy: f64,
    pub insight_count: usize,
    pub recommendation_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HighValueQuestion {
    pub question_id: String,
    pub question_text: String,
    pub category: String,
}

/// Per-family learning state. Writes are always merges into the stored
/// profile, never replacements.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FamilyLearningProfile {
    pub family_id: String,
    pub category_preferences: BTreeMap<String, CategoryPreference>,
    pub excluded_categories: Vec<String>,
    pub excluded_topics: Vec<String>,
    pub family_specific_insights: BTreeMap<String, String>,
    pub high_value_questions: Vec<HighValueQuestion>,
    pub correlation_history: Vec<CorrelationHistoryEntry>,
    pub highest_level_reached: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FamilyLearningProfile {
    pub fn new(family_id: impl Into<String>) -> Self {
        Self {
            family_id: family_id.into(),
            ..Default::default()
        }
    }

    pub fn merge(&mut self, update: &FamilyLearningProfile) {
        for (category, preference) in &update.category_preferences {
            self.category_preferences
                .entry(category.clone())
                .or_default()
                .merge(preference);
        }

        union_into(&mut self.excluded_categories, &update.excluded_categories);
        union_into(&mut self.excluded_topics, &update.excluded_topics);

        for (topic, insight) in &update.family_specific_insights {
            self.family_specific_insights
                .insert(topic.clone(), insight.clone());
        }

        for question in &update.high_value_questions {
            if !self
                .high_value_questions
                .iter()
                .any(|existing| existing.question_id == question.question_id)
            {
                self.high_value_questions.push(question.clone());
            }
        }

        self.correlation_history
            .extend(update.correlation_history.iter().cloned());
        if self.correlation_history.len() > CORRELATION_HISTORY_LIMIT {
            let overflow = self.correlation_history.len() - CORRELATION_HISTORY_LIMIT;
            self.correlation_history.drain(..overflow);
        }

        self.highest_level_reached = self.highest_level_reached.max(update.highest_level_reached);

        if update.updated_at.is_some() {
            self.updated_at = update.updated_at;
        }
    }
}

fn union_into(target: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryApplicability {
    pub applicable: u32,
    pub not_applicable: u32,
    pub total: u32,
    pub applicability_rate: f64,
    pub should_emphasize: bool,
    pub should_deemphasize: bool,
}

/// Result of mining a family's applicability feedback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackPatterns {
    pub family_id: String,
    pub excluded_categories: Vec<String>,
    pub excluded_topics: Vec<String>,
    pub category_preferences: BTreeMap<String, CategoryApplicability>,
    pub high_value_questions: Vec<HighValueQuestion>,
    pub family_specific_insights: BTreeMap<String, String>,
}

/// Cross-family applicability score of a single question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEffectivenessScore {
    pub question_id: String,
    pub total_feedback: u32,
    pub applicable_count: u32,
    pub not_applicable_count: u32,
    pub applicability_rate: f64,
    pub family_count: u32,
    pub effectiveness_score: f64,
}
