use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::household::{HouseholdRole, TaskCategory, TaskSourceType};
use crate::models::task::TaskRecord;
use crate::utils::stats::{percentage, round1};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonShare {
    pub count: u64,
    pub weight: f64,
    pub percentage: f64,
    pub weight_percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub total: u64,
    pub total_weight: f64,
    pub by_person: BTreeMap<String, PersonShare>,
}

/// Share of a category carried by one household role, counted only among
/// role-attributed completions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleShare {
    pub count: u64,
    pub weight: f64,
    pub percentage: f64,
}

impl CategoryStat {
    pub(crate) fn record(&mut self, performer: &str, weight: f64) {
        self.total += 1;
        self.total_weight += weight;
        let entry = self.by_person.entry(performer.to_string()).or_default();
        entry.count += 1;
        entry.weight += weight;
    }

    pub(crate) fn finalize_percentages(&mut self) {
        let total = self.total as f64;
        let total_weight = self.total_weight;
        for share in self.by_person.values_mut() {
            share.percentage = round1(percentage(share.count as f64, total));
            share.weight_percentage = round1(percentage(share.weight, total_weight));
        }
    }

    /// Share of all completions in the category (children and unknown
    /// performers included in the denominator).
    pub fn percentage_for(&self, role: &HouseholdRole) -> f64 {
        self.by_person
            .get(&role.label())
            .map(|share| share.percentage)
            .unwrap_or(0.0)
    }

    /// Role-only distribution; percentages are unrounded.
    pub fn role_shares(&self) -> BTreeMap<HouseholdRole, RoleShare> {
        let mut shares: BTreeMap<HouseholdRole, RoleShare> = BTreeMap::new();
        for (performer, share) in &self.by_person {
            if let Some(role) = HouseholdRole::parse(performer) {
                let entry = shares.entry(role).or_default();
                entry.count += share.count;
                entry.weight += share.weight;
            }
        }

        let role_total: u64 = shares.values().map(|share| share.count).sum();
        for share in shares.values_mut() {
            share.percentage = percentage(share.count as f64, role_total as f64);
        }
        shares
    }

    /// Per-role share of the category total, for every role that appears.
    pub fn role_distribution(&self) -> BTreeMap<HouseholdRole, f64> {
        self.by_person
            .iter()
            .filter_map(|(performer, share)| {
                HouseholdRole::parse(performer).map(|role| (role, share.percentage))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountAndWeight {
    pub count: u64,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonStat {
    pub total: u64,
    pub total_weight: f64,
    pub by_category: BTreeMap<TaskCategory, CountAndWeight>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub title: String,
    pub completed_at: DateTime<Utc>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonCategoryStat {
    pub person: String,
    pub category: TaskCategory,
    pub count: u64,
    pub weight: f64,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStats {
    pub by_category: BTreeMap<TaskCategory, CategoryStat>,
    pub by_person: BTreeMap<String, PersonStat>,
    pub by_task_type: BTreeMap<TaskSourceType, u64>,
    pub by_person_and_category: BTreeMap<String, PersonCategoryStat>,
    pub total_tasks: u64,
    pub task_details: Vec<TaskRecord>,
    pub date_range: DateRange,
}

impl AggregatedStats {
    pub fn empty(date_range: DateRange) -> Self {
        Self {
            by_category: BTreeMap::new(),
            by_person: BTreeMap::new(),
            by_task_type: BTreeMap::new(),
            by_person_and_category: BTreeMap::new(),
            total_tasks: 0,
            task_details: Vec::new(),
            date_range,
        }
    }

    pub fn category(&self, category: TaskCategory) -> Option<&CategoryStat> {
        self.by_category.get(&category)
    }
}
