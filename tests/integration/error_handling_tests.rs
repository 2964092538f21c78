use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};
use household_balance_lib::commands::insights::{
    aggregate_task_stats, analyze_feedback_patterns, get_adaptive_question_set,
    question_effectiveness_get, run_effectiveness_analysis, run_survey_correlation,
    AdaptiveQuestionPayload, AggregateStatsPayload, EffectivenessPayload,
    SurveyCorrelationPayload,
};
use household_balance_lib::commands::settings::{settings_get, settings_update};
use household_balance_lib::commands::survey::{
    question_feedback_submit, survey_submit, FeedbackSubmitPayload, SurveySubmitPayload,
};
use household_balance_lib::commands::AppState;
use household_balance_lib::db::DbPool;
use household_balance_lib::models::household::TaskCategory;
use household_balance_lib::models::progress::ProgressiveQuestion;
use household_balance_lib::models::survey::SurveyQuestion;
use household_balance_lib::services::settings_service::SettingsUpdateInput;
use tempfile::{tempdir, TempDir};

const FAMILY: &str = "family-err";

fn setup() -> (TempDir, PathBuf, AppState) {
    let dir = tempdir().expect("temp dir");
    let data_dir = dir.path().join("data");
    let pool = DbPool::new(data_dir.join("err.sqlite")).expect("db pool");
    let state = AppState::new(pool).expect("app state");
    (dir, data_dir, state)
}

fn base_questions() -> Vec<SurveyQuestion> {
    vec![
        SurveyQuestion {
            id: "q1".to_string(),
            text: "Who does the laundry?".to_string(),
            category: TaskCategory::VisibleHousehold,
            total_weight: 2.0,
            explanation: String::new(),
        },
        SurveyQuestion {
            id: "q2".to_string(),
            text: "Who books the doctor visits?".to_string(),
            category: TaskCategory::InvisibleParental,
            total_weight: 8.0,
            explanation: String::new(),
        },
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_identifiers_are_rejected() {
    let (_dir, _data, state) = setup();

    let err = aggregate_task_stats(
        &state,
        AggregateStatsPayload {
            family_id: "  ".to_string(),
            start_date: None,
            end_date: None,
        },
    )
    .await
    .expect_err("blank family id");
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert_eq!(err.message, "familyId is required");

    let err = question_effectiveness_get(&state, String::new())
        .await
        .expect_err("blank question id");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let err = run_survey_correlation(
        &state,
        SurveyCorrelationPayload {
            family_id: String::new(),
            survey_responses: BTreeMap::new(),
            question_map: BTreeMap::new(),
        },
    )
    .await
    .expect_err("blank family id");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[tokio::test(flavor = "multi_thread")]
async fn inverted_window_yields_empty_stats() {
    let (_dir, _data, state) = setup();
    let start = Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap();

    let stats = aggregate_task_stats(
        &state,
        AggregateStatsPayload {
            family_id: FAMILY.to_string(),
            start_date: Some(start),
            end_date: Some(start - Duration::days(10)),
        },
    )
    .await
    .expect("stats");

    assert_eq!(stats.total_tasks, 0);
    assert!(stats.by_category.is_empty());
    assert_eq!(stats.date_range.start_date, start);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_requests_fail_validation() {
    let (_dir, _data, state) = setup();

    let err = run_effectiveness_analysis(
        &state,
        EffectivenessPayload {
            family_id: FAMILY.to_string(),
            survey_id: "survey-1".to_string(),
            days_to_track: Some(0),
            top_n: None,
        },
    )
    .await
    .expect_err("zero-day window");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let err = question_feedback_submit(
        &state,
        FeedbackSubmitPayload {
            family_id: FAMILY.to_string(),
            question_id: "q1".to_string(),
            question_text: "Who does the laundry?".to_string(),
            category: "Visible Household Tasks".to_string(),
            feedback_type: String::new(),
        },
    )
    .await
    .expect_err("empty feedback type");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let err = survey_submit(
        &state,
        SurveySubmitPayload {
            id: None,
            family_id: FAMILY.to_string(),
            completed_at: None,
            responses: BTreeMap::new(),
            question_metadata: BTreeMap::new(),
        },
    )
    .await
    .expect_err("empty survey");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_range_tracking_window_is_rejected() {
    let (_dir, _data, state) = setup();
    survey_submit(
        &state,
        SurveySubmitPayload {
            id: Some("survey-wide".to_string()),
            family_id: FAMILY.to_string(),
            completed_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()),
            responses: [("q1".to_string(), "Mama".to_string())].into_iter().collect(),
            question_metadata: BTreeMap::new(),
        },
    )
    .await
    .expect("survey stored");

    for days in [100_000_000, i64::MAX] {
        let err = run_effectiveness_analysis(
            &state,
            EffectivenessPayload {
                family_id: FAMILY.to_string(),
                survey_id: "survey-wide".to_string(),
                days_to_track: Some(days),
                top_n: None,
            },
        )
        .await
        .expect_err("window past the calendar range");
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    let err = settings_update(
        &state,
        SettingsUpdateInput {
            aggregation_window_days: Some(100_000_000),
            ..Default::default()
        },
    )
    .await
    .expect_err("oversized aggregation window");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[tokio::test(flavor = "multi_thread")]
async fn settings_updates_are_validated_and_persisted() {
    let (_dir, _data, state) = setup();

    let err = settings_update(
        &state,
        SettingsUpdateInput {
            effectiveness_days_to_track: Some(-3),
            ..Default::default()
        },
    )
    .await
    .expect_err("negative window");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let updated = settings_update(
        &state,
        SettingsUpdateInput {
            top_performer_limit: Some(3),
            ..Default::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.top_performer_limit, 3);

    let current = settings_get(&state).await.expect("settings");
    assert_eq!(current.top_performer_limit, 3);
    assert_eq!(current.effectiveness_days_to_track, 30);
}

#[tokio::test(flavor = "multi_thread")]
async fn unavailable_store_degrades_gracefully() {
    let (_dir, data_dir, state) = setup();
    fs::remove_dir_all(&data_dir).expect("remove data dir");

    let score = question_effectiveness_get(&state, "q1".to_string())
        .await
        .expect("neutral score");
    assert_eq!(score.effectiveness_score, 0.5);
    assert_eq!(score.total_feedback, 0);
    assert!(state.effectiveness_cache().is_empty());

    let set = get_adaptive_question_set(
        &state,
        AdaptiveQuestionPayload {
            family_id: FAMILY.to_string(),
            base_questions: base_questions(),
            week_number: 6,
        },
    )
    .await
    .expect("fallback set");
    assert_eq!(set.level, None);
    assert!(set.strategy.is_none());
    assert_eq!(set.questions.len(), 2);
    assert!(set
        .questions
        .iter()
        .all(|question| matches!(question, ProgressiveQuestion::Base(_))));
    assert_eq!(set.questions[0].id(), "q1");

    let mut responses = BTreeMap::new();
    responses.insert("q1".to_string(), "Mama".to_string());
    let snapshot = run_survey_correlation(
        &state,
        SurveyCorrelationPayload {
            family_id: FAMILY.to_string(),
            survey_responses: responses,
            question_map: BTreeMap::new(),
        },
    )
    .await
    .expect("snapshot despite store failure");
    assert_eq!(snapshot.task_completion_count, 0);
    assert!(snapshot.matches.is_empty() && snapshot.mismatches.is_empty());

    let stats = aggregate_task_stats(
        &state,
        AggregateStatsPayload {
            family_id: FAMILY.to_string(),
            start_date: None,
            end_date: None,
        },
    )
    .await
    .expect("empty stats");
    assert_eq!(stats.total_tasks, 0);

    let err = analyze_feedback_patterns(&state, FAMILY.to_string())
        .await
        .expect_err("feedback read fails");
    assert_eq!(err.code, "STORE_UNAVAILABLE");
}
