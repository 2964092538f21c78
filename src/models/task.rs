use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::household::{TaskCategory, TaskSourceType};

/// A completion event as read from one of the task sources, before
/// normalisation. Optional fields are filled in by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTaskEvent {
    pub id: String,
    pub family_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub task_weight: Option<f64>,
}

impl RawTaskEvent {
    pub fn new(
        id: impl Into<String>,
        family_id: impl Into<String>,
        title: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            family_id: family_id.into(),
            title: title.into(),
            description: None,
            category: None,
            completed_by: None,
            assigned_to: None,
            completed_at,
            frequency: None,
            priority: None,
            task_weight: None,
        }
    }

    pub fn completed_by(mut self, performer: impl Into<String>) -> Self {
        self.completed_by = Some(performer.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.task_weight = Some(weight);
        self
    }
}

/// Canonical, immutable projection of a completed task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub category: TaskCategory,
    pub performed_by: String,
    pub assigned_to: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub source_type: TaskSourceType,
    pub weight: f64,
}
