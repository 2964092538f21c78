use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use household_balance_lib::commands::insights::{aggregate_task_stats, AggregateStatsPayload};
use household_balance_lib::commands::{AppState, StateOverrides};
use household_balance_lib::db::repositories::task_source_repository::TaskSourceRepository;
use household_balance_lib::db::store::{SqliteTaskEventSource, TaskEventSource};
use household_balance_lib::db::DbPool;
use household_balance_lib::error::{AppError, AppResult};
use household_balance_lib::models::household::{TaskCategory, TaskSourceType};
use household_balance_lib::models::task::RawTaskEvent;
use household_balance_lib::services::task_aggregator::TaskSources;
use tempfile::tempdir;

const FAMILY: &str = "family-agg";

fn window_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
}

fn seed(pool: &DbPool, source: TaskSourceType, events: &[RawTaskEvent]) {
    pool.with_connection(|conn| {
        for event in events {
            TaskSourceRepository::insert(conn, source, event)?;
        }
        Ok(())
    })
    .expect("seed events");
}

fn event(id: &str, title: &str, performer: &str, day: i64) -> RawTaskEvent {
    RawTaskEvent::new(id, FAMILY, title, window_start() + Duration::days(day) + Duration::hours(9))
        .completed_by(performer)
}

fn payload(family_id: &str) -> AggregateStatsPayload {
    AggregateStatsPayload {
        family_id: family_id.to_string(),
        start_date: Some(window_start()),
        end_date: Some(window_start() + Duration::days(30)),
    }
}

#[tokio::test]
async fn aggregates_all_three_sources_into_category_shares() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("agg.sqlite")).expect("db pool");

    seed(
        &pool,
        TaskSourceType::Chore,
        &[
            event("c1", "Wash the dishes", "Mama", 1),
            event("c2", "Do the laundry", "Mama", 2),
            event("c3", "Take out trash", "dad", 3),
        ],
    );
    seed(
        &pool,
        TaskSourceType::Kanban,
        &[
            event("k1", "Plan the holiday budget", "Papa", 4),
            event("k2", "Organize closet", "Lena", 5).with_weight(2.0),
        ],
    );
    seed(
        &pool,
        TaskSourceType::Achievement,
        &[event("a1", "Drive to soccer practice", "Mama", 6)
            .with_category("invisible_parental")],
    );
    // Outside the window and another family: both ignored.
    seed(
        &pool,
        TaskSourceType::Chore,
        &[
            event("c-old", "Wash the dishes", "Mama", -10),
            RawTaskEvent::new("c-other", "family-other", "Cook dinner", window_start())
                .completed_by("Papa"),
        ],
    );

    let state = AppState::new(pool.clone()).expect("app state");
    let stats = aggregate_task_stats(&state, payload(FAMILY))
        .await
        .expect("aggregate");

    assert_eq!(stats.total_tasks, 6);
    assert_eq!(stats.by_task_type[&TaskSourceType::Chore], 3);
    assert_eq!(stats.by_task_type[&TaskSourceType::Kanban], 2);
    assert_eq!(stats.by_task_type[&TaskSourceType::Achievement], 1);

    let visible = &stats.by_category[&TaskCategory::VisibleHousehold];
    assert_eq!(visible.total, 3);
    assert_eq!(visible.by_person["Mama"].count, 2);
    assert_eq!(visible.by_person["Papa"].count, 1);
    assert_eq!(visible.by_person["Mama"].percentage, 66.7);

    let invisible = &stats.by_category[&TaskCategory::InvisibleHousehold];
    assert_eq!(invisible.total, 2);
    assert_eq!(invisible.by_person["Lena"].weight, 2.0);

    // Explicit label wins over the keyword rules.
    assert!(stats.by_category.contains_key(&TaskCategory::InvisibleParental));
    assert!(!stats.by_category.contains_key(&TaskCategory::VisibleParental));

    for category in stats.by_category.values() {
        let sum: f64 = category.by_person.values().map(|share| share.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.2, "percentages sum to {sum}");
    }

    let mama_visible = &stats.by_person_and_category["Mama:Visible Household Tasks"];
    assert_eq!(mama_visible.tasks.len(), 2);
    assert_eq!(stats.task_details.len(), 6);
}

#[tokio::test]
async fn identical_inputs_serialize_identically() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("agg.sqlite")).expect("db pool");
    seed(
        &pool,
        TaskSourceType::Chore,
        &[
            event("c1", "Wash the dishes", "Mama", 1),
            event("c2", "Comfort after a nightmare", "Papa", 1),
            event("c3", "School pickup", "guardian:Oma", 2),
        ],
    );

    let state = AppState::new(pool).expect("app state");
    let first = aggregate_task_stats(&state, payload(FAMILY)).await.expect("first");
    let second = aggregate_task_stats(&state, payload(FAMILY)).await.expect("second");

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(first.by_person.contains_key("guardian:Oma"));
}

#[tokio::test]
async fn empty_window_yields_zeroed_stats() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("agg.sqlite")).expect("db pool");
    let state = AppState::new(pool).expect("app state");

    let stats = aggregate_task_stats(&state, payload(FAMILY)).await.expect("aggregate");
    assert_eq!(stats.total_tasks, 0);
    assert!(stats.by_category.is_empty());
    assert_eq!(stats.date_range.start_date, window_start());
}

struct UnavailableSource;

#[async_trait]
impl TaskEventSource for UnavailableSource {
    fn source_type(&self) -> TaskSourceType {
        TaskSourceType::Kanban
    }

    async fn completed_between(
        &self,
        _family_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AppResult<Vec<RawTaskEvent>> {
        Err(AppError::store_unavailable("kanban board offline"))
    }
}

#[tokio::test]
async fn failing_source_counts_as_empty() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("agg.sqlite")).expect("db pool");
    seed(
        &pool,
        TaskSourceType::Chore,
        &[event("c1", "Wash the dishes", "Mama", 1)],
    );
    seed(
        &pool,
        TaskSourceType::Achievement,
        &[event("a1", "Homework help", "Papa", 2)],
    );

    let sources = TaskSources {
        chores: Arc::new(SqliteTaskEventSource::new(pool.clone(), TaskSourceType::Chore)),
        kanban: Arc::new(UnavailableSource),
        achievements: Arc::new(SqliteTaskEventSource::new(
            pool.clone(),
            TaskSourceType::Achievement,
        )),
    };
    let state = AppState::with_overrides(
        pool,
        StateOverrides {
            sources: Some(sources),
            ..Default::default()
        },
    )
    .expect("app state");

    let stats = aggregate_task_stats(&state, payload(FAMILY)).await.expect("aggregate");
    assert_eq!(stats.total_tasks, 2);
    assert!(!stats.by_task_type.contains_key(&TaskSourceType::Kanban));
    assert_eq!(
        stats.by_category[&TaskCategory::VisibleParental].by_person["Papa"].count,
        1
    );
}
