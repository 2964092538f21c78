use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use household_balance_lib::commands::insights::{
    effectiveness_history_get, run_effectiveness_analysis, EffectivenessPayload,
};
use household_balance_lib::commands::survey::{survey_submit, SurveySubmitPayload};
use household_balance_lib::commands::AppState;
use household_balance_lib::db::repositories::task_source_repository::TaskSourceRepository;
use household_balance_lib::db::DbPool;
use household_balance_lib::models::effectiveness::{
    EffectivenessInsightKind, ImpactLevel, ImpactTrend, RedistributionQuality,
};
use household_balance_lib::models::household::{HouseholdRole, TaskCategory, TaskSourceType};
use household_balance_lib::models::survey::QuestionMetadata;
use household_balance_lib::models::task::RawTaskEvent;
use tempfile::{tempdir, TempDir};

const FAMILY: &str = "family-eff";
const SURVEY: &str = "survey-march";

fn pivot() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
}

fn seed(pool: &DbPool, prefix: &str, times: Vec<DateTime<Utc>>, mama: usize) {
    pool.with_connection(|conn| {
        for (n, at) in times.into_iter().enumerate() {
            let performer = if n < mama { "Mama" } else { "Papa" };
            let event = RawTaskEvent::new(format!("{prefix}-{n}"), FAMILY, "Do the laundry", at)
                .completed_by(performer);
            TaskSourceRepository::insert(conn, TaskSourceType::Chore, &event)?;
        }
        Ok(())
    })
    .expect("seed chores");
}

async fn setup() -> (TempDir, AppState) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("eff.sqlite")).expect("db pool");

    let before: Vec<_> = (1..=10)
        .map(|day| pivot() - Duration::days(day) - Duration::hours(1))
        .collect();
    seed(&pool, "before", before, 7);
    let after: Vec<_> = (0..50)
        .map(|n| pivot() + Duration::hours(1 + 10 * n))
        .collect();
    seed(&pool, "after", after, 31);

    let state = AppState::new(pool).expect("app state");

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "q1".to_string(),
        QuestionMetadata::new(TaskCategory::VisibleHousehold, "Who handles the laundry?"),
    );
    let responses = [("q1", "Mama"), ("q2", "Both")]
        .into_iter()
        .map(|(question, answer)| (question.to_string(), answer.to_string()))
        .collect();
    survey_submit(
        &state,
        SurveySubmitPayload {
            id: Some(SURVEY.to_string()),
            family_id: FAMILY.to_string(),
            completed_at: Some(pivot()),
            responses,
            question_metadata: metadata,
        },
    )
    .await
    .expect("survey stored");

    (dir, state)
}

fn payload(family_id: &str, survey_id: &str) -> EffectivenessPayload {
    EffectivenessPayload {
        family_id: family_id.to_string(),
        survey_id: survey_id.to_string(),
        days_to_track: Some(30),
        top_n: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn answer_followed_by_redistribution_scores_high() {
    let (_dir, state) = setup().await;

    let analysis = run_effectiveness_analysis(&state, payload(FAMILY, SURVEY))
        .await
        .expect("analysis");

    assert_eq!(analysis.question_effectiveness.len(), 1);
    let record = &analysis.question_effectiveness["q1"];
    assert_eq!(record.survey_response, HouseholdRole::Mama);
    assert_eq!(record.question_text, "Who handles the laundry?");
    assert!(record.behavior_change);

    let metrics = &record.change_metrics;
    assert_eq!(metrics.before_distribution[&HouseholdRole::Mama], 70.0);
    assert_eq!(metrics.after_distribution[&HouseholdRole::Mama], 62.0);
    assert_eq!(metrics.changes[&HouseholdRole::Mama], -8.0);
    assert_eq!(metrics.changes[&HouseholdRole::Papa], 8.0);
    assert_eq!(metrics.redistribution_quality, RedistributionQuality::Moderate);
    assert_eq!(metrics.imbalance_reduction, 16.0);
    assert!(metrics.balance_improved);

    assert_eq!(record.effectiveness_score, 71.0);
    assert_eq!(record.impact, ImpactLevel::High);

    assert_eq!(analysis.top_performers.len(), 1);
    assert!(analysis.top_performers[0].change_achieved);
    assert_eq!(analysis.patterns.high_impact_questions, vec!["q1".to_string()]);
    assert!(analysis
        .insights
        .iter()
        .any(|insight| insight.kind == EffectivenessInsightKind::Behavior));

    assert_eq!(analysis.overall_impact.categories_improved, 1);
    assert_eq!(analysis.overall_impact.net_improvement, 1);
    assert_eq!(analysis.overall_impact.overall_trend, ImpactTrend::Positive);
    assert_eq!(analysis.overall_impact.total_imbalance_reduction, 16.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn rerunning_replaces_the_stored_analysis() {
    let (_dir, state) = setup().await;

    run_effectiveness_analysis(&state, payload(FAMILY, SURVEY))
        .await
        .expect("first analysis");
    run_effectiveness_analysis(&state, payload(FAMILY, SURVEY))
        .await
        .expect("second analysis");

    let history = effectiveness_history_get(&state, FAMILY.to_string(), None)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].survey_id, SURVEY);
    assert_eq!(history[0].overall_impact.net_improvement, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_or_foreign_survey_is_not_found() {
    let (_dir, state) = setup().await;

    let missing = run_effectiveness_analysis(&state, payload(FAMILY, "no-such-survey"))
        .await
        .expect_err("missing survey");
    assert_eq!(missing.code, "NOT_FOUND");
    assert_eq!(missing.message, "survey not found");

    let foreign = run_effectiveness_analysis(&state, payload("family-other", SURVEY))
        .await
        .expect_err("foreign survey");
    assert_eq!(foreign.code, "NOT_FOUND");

    let history = effectiveness_history_get(&state, FAMILY.to_string(), Some(3))
        .await
        .expect("history");
    assert!(history.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn shorter_window_sees_less_of_the_shift() {
    let (_dir, state) = setup().await;

    let mut short = payload(FAMILY, SURVEY);
    short.days_to_track = Some(1);
    let analysis = run_effectiveness_analysis(&state, short)
        .await
        .expect("analysis");

    // Only the day-one completions fall inside the window.
    let metrics = &analysis.question_effectiveness["q1"].change_metrics;
    assert_eq!(metrics.after_distribution[&HouseholdRole::Mama], 100.0);
    assert!(!metrics.redistribution_occurred);
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_at_survey_time_counts_once() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("edge.sqlite")).expect("db pool");
    seed(&pool, "edge", vec![pivot() - Duration::hours(1), pivot()], 1);
    let state = AppState::new(pool).expect("app state");

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "q1".to_string(),
        QuestionMetadata::new(TaskCategory::VisibleHousehold, "Who handles the laundry?"),
    );
    survey_submit(
        &state,
        SurveySubmitPayload {
            id: Some(SURVEY.to_string()),
            family_id: FAMILY.to_string(),
            completed_at: Some(pivot()),
            responses: [("q1".to_string(), "Mama".to_string())].into_iter().collect(),
            question_metadata: metadata,
        },
    )
    .await
    .expect("survey stored");

    let mut window = payload(FAMILY, SURVEY);
    window.days_to_track = Some(1);
    let analysis = run_effectiveness_analysis(&state, window)
        .await
        .expect("analysis");

    let metrics = &analysis.question_effectiveness["q1"].change_metrics;
    assert_eq!(metrics.before_distribution[&HouseholdRole::Mama], 100.0);
    assert_eq!(metrics.before_distribution[&HouseholdRole::Papa], 0.0);
    assert_eq!(metrics.after_distribution[&HouseholdRole::Papa], 100.0);
}
