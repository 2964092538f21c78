use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::db::store::{SqliteTaskEventSource, TaskEventSource};
use crate::db::DbPool;
use crate::models::aggregate::{AggregatedStats, DateRange, PersonCategoryStat, TaskSummary};
use crate::models::household::{HouseholdRole, TaskCategory, TaskSourceType};
use crate::models::task::{RawTaskEvent, TaskRecord};
use crate::services::classifier::CategoryClassifier;
use crate::utils::text::contains_any;

const UNKNOWN_PERFORMER: &str = "Unknown";
const BASE_TASK_WEIGHT: f64 = 5.0;

/// The three independent completion feeds.
#[derive(Clone)]
pub struct TaskSources {
    pub chores: Arc<dyn TaskEventSource>,
    pub kanban: Arc<dyn TaskEventSource>,
    pub achievements: Arc<dyn TaskEventSource>,
}

impl TaskSources {
    pub fn sqlite(db: &DbPool) -> Self {
        Self {
            chores: Arc::new(SqliteTaskEventSource::new(db.clone(), TaskSourceType::Chore)),
            kanban: Arc::new(SqliteTaskEventSource::new(db.clone(), TaskSourceType::Kanban)),
            achievements: Arc::new(SqliteTaskEventSource::new(
                db.clone(),
                TaskSourceType::Achievement,
            )),
        }
    }
}

pub struct TaskCompletionAggregator {
    sources: TaskSources,
    classifier: Arc<dyn CategoryClassifier>,
    window_days: i64,
}

impl TaskCompletionAggregator {
    pub fn new(
        sources: TaskSources,
        classifier: Arc<dyn CategoryClassifier>,
        window_days: i64,
    ) -> Self {
        Self {
            sources,
            classifier,
            window_days,
        }
    }

    /// Statistics over `[start, end]`, defaulting to the trailing window that
    /// ends now. Never fails: unreadable sources count as empty.
    pub async fn get_task_completion_data(
        &self,
        family_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AggregatedStats {
        let end = end.unwrap_or_else(Utc::now);
        let start = start.unwrap_or_else(|| {
            Duration::try_days(self.window_days)
                .and_then(|window| end.checked_sub_signed(window))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        let date_range = DateRange {
            start_date: start,
            end_date: end,
        };

        if start > end {
            warn!(
                target: "app::aggregator",
                family_id,
                %start,
                %end,
                "aggregation window is inverted"
            );
            return AggregatedStats::empty(date_range);
        }

        let (chores, kanban, achievements) = tokio::join!(
            fetch_or_empty(self.sources.chores.as_ref(), family_id, start, end),
            fetch_or_empty(self.sources.kanban.as_ref(), family_id, start, end),
            fetch_or_empty(self.sources.achievements.as_ref(), family_id, start, end),
        );

        let records: Vec<TaskRecord> = [
            (TaskSourceType::Chore, chores),
            (TaskSourceType::Kanban, kanban),
            (TaskSourceType::Achievement, achievements),
        ]
        .into_iter()
        .flat_map(|(source, events)| {
            events
                .into_iter()
                .map(move |event| (source, event))
        })
        .map(|(source, event)| self.normalize(event, source))
        .collect();

        debug!(
            target: "app::aggregator",
            family_id,
            tasks = records.len(),
            "aggregating task completions"
        );

        aggregate(records, date_range)
    }

    pub fn normalize(&self, event: RawTaskEvent, source_type: TaskSourceType) -> TaskRecord {
        let category = event
            .category
            .as_deref()
            .and_then(TaskCategory::from_label)
            .unwrap_or_else(|| {
                let text = match event.description.as_deref() {
                    Some(description) => format!("{} {}", event.title, description),
                    None => event.title.clone(),
                };
                self.classifier.classify(&text)
            });

        let weight = match event.task_weight {
            Some(weight) if weight.is_finite() && weight >= 0.0 => weight,
            _ => estimate_task_weight(&event),
        };

        // Only kanban cards treat the assignee as the one who finished them.
        let assignee = match source_type {
            TaskSourceType::Kanban => event.assigned_to.as_deref(),
            _ => None,
        };
        let performed_by = event
            .completed_by
            .as_deref()
            .or(assignee)
            .map(canonical_performer)
            .unwrap_or_else(|| UNKNOWN_PERFORMER.to_string());

        TaskRecord {
            id: event.id,
            title: event.title,
            category,
            performed_by,
            assigned_to: event.assigned_to,
            completed_at: event.completed_at,
            source_type,
            weight,
        }
    }
}

async fn fetch_or_empty(
    source: &dyn TaskEventSource,
    family_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<RawTaskEvent> {
    match source.completed_between(family_id, start, end).await {
        Ok(events) => events,
        Err(err) => {
            warn!(
                target: "app::aggregator",
                family_id,
                source = %source.source_type(),
                error = %err,
                "task source unavailable, treating as empty"
            );
            Vec::new()
        }
    }
}

fn canonical_performer(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_PERFORMER.to_string();
    }
    HouseholdRole::parse(trimmed)
        .map(|role| role.label())
        .unwrap_or_else(|| trimmed.to_string())
}

pub fn estimate_task_weight(event: &RawTaskEvent) -> f64 {
    let mut weight = BASE_TASK_WEIGHT;

    match event.frequency.as_deref().map(str::to_lowercase).as_deref() {
        Some("daily") => weight += 3.0,
        Some("weekly") => weight += 1.0,
        _ => {}
    }

    match event.priority.as_deref().map(str::to_lowercase).as_deref() {
        Some("high") => weight += 2.0,
        Some("medium") => weight += 1.0,
        _ => {}
    }

    let title = event.title.to_lowercase();
    if contains_any(&title, &["plan", "coordinate"]) {
        weight += 2.0;
    }
    if contains_any(&title, &["emotional", "support"]) {
        weight += 3.0;
    }

    weight
}

/// Pure fold of canonical records into the multi-dimensional statistics.
pub fn aggregate(mut records: Vec<TaskRecord>, date_range: DateRange) -> AggregatedStats {
    records.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then_with(|| a.source_type.cmp(&b.source_type))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut stats = AggregatedStats::empty(date_range);
    stats.total_tasks = records.len() as u64;

    for record in &records {
        let person = record.performed_by.as_str();

        stats
            .by_category
            .entry(record.category)
            .or_default()
            .record(person, record.weight);

        let person_stat = stats.by_person.entry(person.to_string()).or_default();
        person_stat.total += 1;
        person_stat.total_weight += record.weight;
        let per_category = person_stat.by_category.entry(record.category).or_default();
        per_category.count += 1;
        per_category.weight += record.weight;

        *stats.by_task_type.entry(record.source_type).or_insert(0) += 1;

        let key = format!("{}:{}", person, record.category);
        let combined = stats
            .by_person_and_category
            .entry(key)
            .or_insert_with(|| PersonCategoryStat {
                person: person.to_string(),
                category: record.category,
                count: 0,
                weight: 0.0,
                tasks: Vec::new(),
            });
        combined.count += 1;
        combined.weight += record.weight;
        combined.tasks.push(TaskSummary {
            title: record.title.clone(),
            completed_at: record.completed_at,
            weight: record.weight,
        });
    }

    for category_stat in stats.by_category.values_mut() {
        category_stat.finalize_percentages();
    }

    stats.task_details = records;
    stats
}
