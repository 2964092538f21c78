use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::household::TaskCategory;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMetadata {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl QuestionMetadata {
    pub fn new(category: TaskCategory, text: impl Into<String>) -> Self {
        Self {
            category: Some(category.as_str().to_string()),
            text: Some(text.into()),
        }
    }

    pub fn task_category(&self) -> Option<TaskCategory> {
        self.category.as_deref().and_then(TaskCategory::from_label)
    }
}

/// A completed survey with its raw answers, keyed by question id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    pub id: String,
    pub family_id: String,
    pub completed_at: DateTime<Utc>,
    pub responses: BTreeMap<String, String>,
    #[serde(default)]
    pub question_metadata: BTreeMap<String, QuestionMetadata>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Applicable,
    NotApplicable,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Applicable => "applicable",
            FeedbackType::NotApplicable => "not_applicable",
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for FeedbackType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "not_applicable" => Ok(FeedbackType::NotApplicable),
            // Any other feedback kind (helpful, confusing, ...) still means
            // the question applied to the family.
            "" => Err("empty feedback type".to_string()),
            _ => Ok(FeedbackType::Applicable),
        }
    }
}

/// Per-question applicability feedback left by a family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFeedback {
    pub family_id: String,
    pub question_id: String,
    pub question_text: String,
    pub category: String,
    pub feedback_type: FeedbackType,
    pub created_at: DateTime<Utc>,
}

/// A question from the base survey bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveyQuestion {
    pub id: String,
    pub text: String,
    pub category: TaskCategory,
    #[serde(default)]
    pub total_weight: f64,
    #[serde(default)]
    pub explanation: String,
}
