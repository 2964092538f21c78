use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::household::TaskCategory;
use crate::models::survey::SurveyQuestion;

/// Ordered engagement stages. A family is never moved back down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MaturityLevel {
    Awareness = 1,
    Recognition = 2,
    Planning = 3,
    Implementation = 4,
    Optimization = 5,
}

impl MaturityLevel {
    pub const ALL: [MaturityLevel; 5] = [
        MaturityLevel::Awareness,
        MaturityLevel::Recognition,
        MaturityLevel::Planning,
        MaturityLevel::Implementation,
        MaturityLevel::Optimization,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Clamps out-of-range values into 1..=5.
    pub fn from_value(value: u8) -> Self {
        match value {
            0 | 1 => MaturityLevel::Awareness,
            2 => MaturityLevel::Recognition,
            3 => MaturityLevel::Planning,
            4 => MaturityLevel::Implementation,
            _ => MaturityLevel::Optimization,
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            MaturityLevel::Optimization => None,
            other => Some(MaturityLevel::from_value(other.value() + 1)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MaturityLevel::Awareness => "Awareness",
            MaturityLevel::Recognition => "Recognition",
            MaturityLevel::Planning => "Planning",
            MaturityLevel::Implementation => "Implementation",
            MaturityLevel::Optimization => "Optimization",
        }
    }
}

impl Default for MaturityLevel {
    fn default() -> Self {
        MaturityLevel::Awareness
    }
}

impl fmt::Display for MaturityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.value())
    }
}

impl TryFrom<u8> for MaturityLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&value) {
            Ok(MaturityLevel::from_value(value))
        } else {
            Err(format!("maturity level out of range: {value}"))
        }
    }
}

impl From<MaturityLevel> for u8 {
    fn from(value: MaturityLevel) -> Self {
        value.value()
    }
}

/// Derived on demand from survey, correlation and effectiveness history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyProgressProfile {
    pub current_level: MaturityLevel,
    pub surveys_completed: usize,
    pub average_accuracy: f64,
    pub improvement_rate: i32,
    pub ready_to_progress: bool,
    pub strengths: Vec<TaskCategory>,
    pub challenges: Vec<TaskCategory>,
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationStrategy {
    pub focus: String,
    pub question_types: Vec<String>,
    pub complexity: Complexity,
    pub follow_ups: bool,
    pub action_oriented: bool,
    pub emphasis_areas: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetaQuestionType {
    Ranking,
    Select,
    Scale,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RatingScale {
    pub min: u8,
    pub max: u8,
    pub labels: [String; 2],
}

/// Synthetic question generated for the family's level rather than taken
/// from the base bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetaQuestion {
    pub id: String,
    pub text: String,
    pub category: String,
    #[serde(rename = "type")]
    pub question_type: MetaQuestionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<RatingScale>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdaptedQuestion {
    pub id: String,
    pub text: String,
    pub original_text: String,
    pub category: TaskCategory,
    pub total_weight: f64,
    pub explanation: String,
    pub level_adapted: MaturityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProgressiveQuestion {
    Meta(MetaQuestion),
    Adapted(AdaptedQuestion),
    Base(SurveyQuestion),
}

impl ProgressiveQuestion {
    pub fn id(&self) -> &str {
        match self {
            ProgressiveQuestion::Meta(question) => &question.id,
            ProgressiveQuestion::Adapted(question) => &question.id,
            ProgressiveQuestion::Base(question) => &question.id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ProgressiveQuestion::Meta(question) => &question.text,
            ProgressiveQuestion::Adapted(question) => &question.text,
            ProgressiveQuestion::Base(question) => &question.text,
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self, ProgressiveQuestion::Meta(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressiveQuestionSet {
    pub family_id: String,
    pub week_number: u32,
    /// `None` when the assessment failed and base questions were served as-is.
    pub level: Option<MaturityLevel>,
    pub strategy: Option<AdaptationStrategy>,
    pub questions: Vec<ProgressiveQuestion>,
}
