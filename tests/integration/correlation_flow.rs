use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use household_balance_lib::commands::cache::cache_clear_all;
use household_balance_lib::commands::insights::{
    analyze_feedback_patterns, question_effectiveness_get, run_survey_correlation,
    SurveyCorrelationPayload,
};
use household_balance_lib::commands::survey::{
    question_feedback_submit, survey_submit, FeedbackSubmitPayload, SurveySubmitPayload,
};
use household_balance_lib::commands::AppState;
use household_balance_lib::db::repositories::task_source_repository::TaskSourceRepository;
use household_balance_lib::db::DbPool;
use household_balance_lib::models::correlation::InsightKind;
use household_balance_lib::models::household::{
    HouseholdRole, PrimaryDoer, TaskCategory, TaskSourceType,
};
use household_balance_lib::models::learning::CORRELATION_HISTORY_LIMIT;
use household_balance_lib::models::survey::QuestionMetadata;
use household_balance_lib::models::task::RawTaskEvent;
use tempfile::{tempdir, TempDir};

const FAMILY: &str = "family-corr";

fn setup() -> (TempDir, DbPool, AppState) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("corr.sqlite")).expect("db pool");
    let state = AppState::new(pool.clone()).expect("app state");
    (dir, pool, state)
}

fn seed_chores(pool: &DbPool, title: &str, counts: &[(&str, usize)]) {
    let now = Utc::now();
    pool.with_connection(|conn| {
        for (performer, count) in counts {
            for n in 0..*count {
                let event = RawTaskEvent::new(
                    format!("{title}-{performer}-{n}"),
                    FAMILY,
                    title,
                    now - Duration::days(1 + n as i64) - Duration::hours(3),
                )
                .completed_by(*performer);
                TaskSourceRepository::insert(conn, TaskSourceType::Chore, &event)?;
            }
        }
        Ok(())
    })
    .expect("seed chores");
}

fn responses(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(question, answer)| (question.to_string(), answer.to_string()))
        .collect()
}

fn correlation_payload(pairs: &[(&str, &str)]) -> SurveyCorrelationPayload {
    SurveyCorrelationPayload {
        family_id: FAMILY.to_string(),
        survey_responses: responses(pairs),
        question_map: BTreeMap::new(),
    }
}

fn feedback(question_id: &str, text: &str, category: &str, kind: &str) -> FeedbackSubmitPayload {
    FeedbackSubmitPayload {
        family_id: FAMILY.to_string(),
        question_id: question_id.to_string(),
        question_text: text.to_string(),
        category: category.to_string(),
        feedback_type: kind.to_string(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn lopsided_category_answered_wrongly_is_a_mismatch() {
    let (_dir, pool, state) = setup();
    seed_chores(&pool, "Wash the dishes", &[("Mama", 8), ("Papa", 2)]);

    let mut payload = correlation_payload(&[("q10", "Papa"), ("q11", "Both")]);
    payload.question_map.insert(
        "q10".to_string(),
        QuestionMetadata::new(TaskCategory::VisibleHousehold, "Who washes the dishes?"),
    );

    let snapshot = run_survey_correlation(&state, payload)
        .await
        .expect("correlation");

    assert_eq!(snapshot.survey_response_count, 2);
    assert_eq!(snapshot.task_completion_count, 10);
    assert!(snapshot.matches.is_empty());
    assert_eq!(snapshot.mismatches.len(), 1);

    let mismatch = &snapshot.mismatches[0];
    assert_eq!(mismatch.question_text, "Who washes the dishes?");
    assert_eq!(mismatch.survey_answer, HouseholdRole::Papa);
    assert_eq!(mismatch.actual_primary_doer, PrimaryDoer::Role(HouseholdRole::Mama));
    assert_eq!(mismatch.percentages[&HouseholdRole::Mama].percentage, "80.0");
    assert_eq!(mismatch.percentages[&HouseholdRole::Papa].percentage, "20.0");

    assert_eq!(snapshot.accuracy.overall, 0.0);
    assert!(snapshot
        .insights
        .iter()
        .any(|insight| insight.kind == InsightKind::Concern));
    let imbalance: Vec<_> = snapshot
        .insights
        .iter()
        .filter(|insight| insight.kind == InsightKind::Imbalance)
        .collect();
    assert_eq!(imbalance.len(), 1);
    assert_eq!(imbalance[0].category, Some(TaskCategory::VisibleHousehold));
    assert_eq!(
        imbalance[0].reality.as_deref(),
        Some("Actually Mama does 80% of these tasks")
    );
    let gap = snapshot
        .insights
        .iter()
        .find(|insight| insight.kind == InsightKind::PerceptionGap)
        .expect("perception gap insight");
    assert_eq!(gap.gap, Some(80.0));

    let stored = state
        .store()
        .recent_correlation_snapshots(FAMILY, 5)
        .await
        .expect("stored snapshots");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, snapshot.id);

    let profile = state
        .store()
        .load_learning_profile(FAMILY)
        .await
        .expect("profile read")
        .expect("profile exists");
    assert_eq!(profile.correlation_history.len(), 1);
    let preference = &profile.category_preferences["Visible Household Tasks"];
    assert!(preference.needs_reframing);
    assert_eq!(preference.last_accuracy, Some(0.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_category_matches_any_answer() {
    let (_dir, pool, state) = setup();
    seed_chores(&pool, "Plan the weekly budget", &[("Mama", 5), ("dad", 5)]);

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "custom-budget".to_string(),
        QuestionMetadata::new(TaskCategory::InvisibleHousehold, "Who keeps the budget?"),
    );
    survey_submit(
        &state,
        SurveySubmitPayload {
            id: Some("survey-shared".to_string()),
            family_id: FAMILY.to_string(),
            completed_at: None,
            responses: responses(&[("custom-budget", "Mama")]),
            question_metadata: metadata,
        },
    )
    .await
    .expect("survey stored");

    // Category comes from the stored survey metadata, not the payload.
    let snapshot = run_survey_correlation(&state, correlation_payload(&[("custom-budget", "Mama")]))
        .await
        .expect("correlation");

    assert_eq!(snapshot.matches.len(), 1);
    assert_eq!(snapshot.matches[0].actual_primary_doer, PrimaryDoer::Shared);
    assert_eq!(snapshot.matches[0].category, TaskCategory::InvisibleHousehold);
    assert_eq!(snapshot.accuracy.overall, 100.0);
    assert!(snapshot
        .insights
        .iter()
        .any(|insight| insight.kind == InsightKind::Positive));
    assert!(!snapshot
        .insights
        .iter()
        .any(|insight| insight.kind == InsightKind::HiddenWork));
}

#[tokio::test(flavor = "multi_thread")]
async fn correlation_history_is_bounded() {
    let (_dir, pool, state) = setup();
    seed_chores(&pool, "Wash the dishes", &[("Mama", 3)]);

    for _ in 0..12 {
        run_survey_correlation(&state, correlation_payload(&[("q5", "Mama")]))
            .await
            .expect("correlation");
    }

    let profile = state
        .store()
        .load_learning_profile(FAMILY)
        .await
        .expect("profile read")
        .expect("profile exists");
    assert_eq!(profile.correlation_history.len(), CORRELATION_HISTORY_LIMIT);
    assert!(profile
        .correlation_history
        .iter()
        .all(|entry| entry.overall_accuracy == 100.0));

    let snapshots = state
        .store()
        .recent_correlation_snapshots(FAMILY, 50)
        .await
        .expect("snapshots");
    assert_eq!(snapshots.len(), 12);
}

#[tokio::test(flavor = "multi_thread")]
async fn feedback_patterns_exclude_topics_and_categories() {
    let (_dir, _pool, state) = setup();

    for n in 0..6 {
        question_feedback_submit(
            &state,
            feedback(
                &format!("snow-{n}"),
                "Who clears the snow in winter?",
                "Invisible Parental Tasks",
                "not_applicable",
            ),
        )
        .await
        .expect("feedback stored");
    }
    question_feedback_submit(
        &state,
        feedback("q1", "Who does the cooking?", "Visible Household Tasks", "helpful"),
    )
    .await
    .expect("feedback stored");

    let patterns = analyze_feedback_patterns(&state, FAMILY.to_string())
        .await
        .expect("patterns");

    assert_eq!(patterns.excluded_categories, vec!["Invisible Parental Tasks".to_string()]);
    assert_eq!(patterns.excluded_topics, vec!["snow".to_string()]);
    assert!(patterns.family_specific_insights.contains_key("snow"));
    assert_eq!(patterns.high_value_questions.len(), 1);
    assert_eq!(patterns.high_value_questions[0].question_id, "q1");
    let cooking = &patterns.category_preferences["Visible Household Tasks"];
    assert!(cooking.should_emphasize);

    let profile = state
        .store()
        .load_learning_profile(FAMILY)
        .await
        .expect("profile read")
        .expect("profile exists");
    assert_eq!(profile.excluded_topics, vec!["snow".to_string()]);
    assert_eq!(
        profile.category_preferences["Invisible Parental Tasks"].applicability_rate,
        Some(0.0)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn question_scores_are_memoised_until_cleared() {
    let (_dir, _pool, state) = setup();

    let first = question_effectiveness_get(&state, "q1".to_string())
        .await
        .expect("score");
    assert_eq!(first.total_feedback, 0);
    assert_eq!(first.effectiveness_score, 0.5);

    question_feedback_submit(
        &state,
        feedback("q1", "Who does the cooking?", "Visible Household Tasks", "applicable"),
    )
    .await
    .expect("feedback stored");

    let stale = question_effectiveness_get(&state, "q1".to_string())
        .await
        .expect("score");
    assert_eq!(stale.total_feedback, 0);

    let cleared = cache_clear_all(&state).await.expect("cache cleared");
    assert_eq!(cleared.question_scores_cleared, 1);

    let fresh = question_effectiveness_get(&state, "q1".to_string())
        .await
        .expect("score");
    assert_eq!(fresh.total_feedback, 1);
    assert_eq!(fresh.applicability_rate, 1.0);
    assert_eq!(fresh.family_count, 1);
    assert!((fresh.effectiveness_score - 0.66).abs() < 1e-9);
}
