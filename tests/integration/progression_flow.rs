use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use household_balance_lib::commands::insights::{
    assess_family_progress, get_adaptive_question_set, AdaptiveQuestionPayload,
};
use household_balance_lib::commands::survey::{survey_submit, SurveySubmitPayload};
use household_balance_lib::commands::{AppState, StateOverrides};
use household_balance_lib::db::DbPool;
use household_balance_lib::models::aggregate::DateRange;
use household_balance_lib::models::correlation::{CorrelationAccuracy, CorrelationSnapshot};
use household_balance_lib::models::effectiveness::{
    EffectivenessPatterns, OverallImpact, StoredEffectivenessAnalysis,
};
use household_balance_lib::models::household::TaskCategory;
use household_balance_lib::models::progress::{MaturityLevel, ProgressiveQuestion};
use household_balance_lib::models::survey::SurveyQuestion;
use tempfile::{tempdir, TempDir};

const FAMILY: &str = "family-prog";

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap() + Duration::days(n)
}

fn setup_with_seed(seed: Option<u64>) -> (TempDir, AppState) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("prog.sqlite")).expect("db pool");
    let state = AppState::with_overrides(
        pool,
        StateOverrides {
            follow_up_seed: seed,
            ..Default::default()
        },
    )
    .expect("app state");
    (dir, state)
}

fn snapshot(at: DateTime<Utc>, overall: f64, by_category: &[(TaskCategory, f64)]) -> CorrelationSnapshot {
    CorrelationSnapshot {
        id: format!("snapshot-{}", at.timestamp()),
        family_id: FAMILY.to_string(),
        timestamp: at,
        survey_response_count: 4,
        task_completion_count: 20,
        date_range: DateRange {
            start_date: at - Duration::days(30),
            end_date: at,
        },
        accuracy: CorrelationAccuracy {
            overall,
            by_category: by_category.iter().copied().collect(),
        },
        matches: Vec::new(),
        mismatches: Vec::new(),
        category_analysis: BTreeMap::new(),
        insights: Vec::new(),
        recommendations: Vec::new(),
    }
}

fn analysis(survey_id: &str, at: DateTime<Utc>, net_improvement: i32) -> StoredEffectivenessAnalysis {
    StoredEffectivenessAnalysis {
        family_id: FAMILY.to_string(),
        survey_id: survey_id.to_string(),
        question_effectiveness: BTreeMap::new(),
        patterns: EffectivenessPatterns::default(),
        overall_impact: OverallImpact {
            net_improvement,
            ..Default::default()
        },
        analysis_date: at,
    }
}

/// Three surveys, 75% accuracy with visible household work as the weak
/// spot, and one net category of improvement across analyses.
async fn seed_planning_history(state: &AppState) {
    for n in 0..3 {
        let responses = [("q1".to_string(), "Mama".to_string())].into_iter().collect();
        survey_submit(
            state,
            SurveySubmitPayload {
                id: Some(format!("survey-{n}")),
                family_id: FAMILY.to_string(),
                completed_at: Some(day(n * 7)),
                responses,
                question_metadata: BTreeMap::new(),
            },
        )
        .await
        .expect("survey stored");
    }

    let store = state.store();
    for n in 0..3 {
        store
            .save_correlation_snapshot(snapshot(
                day(n * 7 + 1),
                75.0,
                &[
                    (TaskCategory::VisibleHousehold, 50.0),
                    (TaskCategory::InvisibleParental, 100.0),
                ],
            ))
            .await
            .expect("snapshot stored");
    }
    store
        .save_effectiveness_analysis(analysis("survey-0", day(2), 0))
        .await
        .expect("analysis stored");
    store
        .save_effectiveness_analysis(analysis("survey-1", day(9), 1))
        .await
        .expect("analysis stored");
}

fn base_questions() -> Vec<SurveyQuestion> {
    vec![
        SurveyQuestion {
            id: "q1".to_string(),
            text: "Who cooks dinner on weekdays?".to_string(),
            category: TaskCategory::VisibleHousehold,
            total_weight: 4.0,
            explanation: "Daily meals are the most visible chore.".to_string(),
        },
        SurveyQuestion {
            id: "q2".to_string(),
            text: "Who notices when a child is struggling?".to_string(),
            category: TaskCategory::InvisibleParental,
            total_weight: 12.0,
            explanation: "Emotional labor is easy to overlook.".to_string(),
        },
        SurveyQuestion {
            id: "q3".to_string(),
            text: "Who plans the birthdays?".to_string(),
            category: TaskCategory::InvisibleHousehold,
            total_weight: 3.0,
            explanation: String::new(),
        },
    ]
}

fn question_payload(week_number: u32) -> AdaptiveQuestionPayload {
    AdaptiveQuestionPayload {
        family_id: FAMILY.to_string(),
        base_questions: base_questions(),
        week_number,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn new_family_starts_at_awareness() {
    let (_dir, state) = setup_with_seed(None);

    let first = assess_family_progress(&state, FAMILY.to_string())
        .await
        .expect("assessment");
    let second = assess_family_progress(&state, FAMILY.to_string())
        .await
        .expect("assessment");

    assert_eq!(first, second);
    assert_eq!(first.current_level, MaturityLevel::Awareness);
    assert_eq!(first.surveys_completed, 0);
    assert_eq!(first.average_accuracy, 0.0);
    assert!(!first.ready_to_progress);

    let set = get_adaptive_question_set(&state, question_payload(1))
        .await
        .expect("question set");
    assert_eq!(set.level, Some(MaturityLevel::Awareness));
    assert!(set.questions.iter().all(|question| !question.is_meta()));
    // Only the heavy question is relevant without known challenges.
    let ids: Vec<&str> = set.questions.iter().map(ProgressiveQuestion::id).collect();
    assert_eq!(ids, vec!["q2"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn planning_family_gets_meta_questions_first() {
    let (_dir, state) = setup_with_seed(Some(11));
    seed_planning_history(&state).await;

    let profile = assess_family_progress(&state, FAMILY.to_string())
        .await
        .expect("assessment");
    assert_eq!(profile.current_level, MaturityLevel::Planning);
    assert_eq!(profile.surveys_completed, 3);
    assert_eq!(profile.average_accuracy, 75.0);
    assert_eq!(profile.improvement_rate, 1);
    assert!(!profile.ready_to_progress);
    assert_eq!(profile.challenges, vec![TaskCategory::VisibleHousehold]);
    assert_eq!(profile.strengths, vec![TaskCategory::InvisibleParental]);
    assert_eq!(
        profile.focus_areas,
        vec![
            "Visible Household Tasks".to_string(),
            "Creating sustainable systems".to_string()
        ]
    );

    let set = get_adaptive_question_set(&state, question_payload(4))
        .await
        .expect("question set");
    assert_eq!(set.level, Some(MaturityLevel::Planning));
    assert_eq!(set.week_number, 4);

    let ids: Vec<&str> = set.questions.iter().map(ProgressiveQuestion::id).collect();
    assert_eq!(ids, vec!["level-3-1", "level-3-2", "q1", "q2"]);

    match &set.questions[0] {
        ProgressiveQuestion::Meta(meta) => {
            assert_eq!(meta.options, vec!["Visible Household Tasks".to_string()]);
        }
        other => panic!("expected meta question, got {other:?}"),
    }
    match &set.questions[2] {
        ProgressiveQuestion::Adapted(adapted) => {
            assert_eq!(adapted.original_text, "Who cooks dinner on weekdays?");
            assert_eq!(adapted.level_adapted, MaturityLevel::Planning);
            assert!(adapted
                .explanation
                .contains("especially important for your family's work on Visible Household Tasks"));
        }
        other => panic!("expected adapted question, got {other:?}"),
    }

    let learning = state
        .store()
        .load_learning_profile(FAMILY)
        .await
        .expect("profile read")
        .expect("profile exists");
    assert_eq!(learning.highest_level_reached, MaturityLevel::Planning.value());
}

#[tokio::test(flavor = "multi_thread")]
async fn served_level_is_kept_when_accuracy_drops() {
    let (_dir, state) = setup_with_seed(Some(3));
    seed_planning_history(&state).await;
    get_adaptive_question_set(&state, question_payload(4))
        .await
        .expect("question set");

    let store = state.store();
    for n in 0..5 {
        store
            .save_correlation_snapshot(snapshot(
                day(30 + n),
                20.0,
                &[(TaskCategory::VisibleHousehold, 20.0)],
            ))
            .await
            .expect("snapshot stored");
    }

    let profile = assess_family_progress(&state, FAMILY.to_string())
        .await
        .expect("assessment");
    assert_eq!(profile.average_accuracy, 20.0);
    assert_eq!(profile.current_level, MaturityLevel::Planning);
    assert!(!profile.ready_to_progress);
}

#[tokio::test(flavor = "multi_thread")]
async fn same_seed_builds_the_same_question_set() {
    let (_first_dir, first_state) = setup_with_seed(Some(42));
    let (_second_dir, second_state) = setup_with_seed(Some(42));
    seed_planning_history(&first_state).await;
    seed_planning_history(&second_state).await;

    let first = get_adaptive_question_set(&first_state, question_payload(2))
        .await
        .expect("question set");
    let second = get_adaptive_question_set(&second_state, question_payload(2))
        .await
        .expect("question set");

    assert_eq!(
        serde_json::to_string(&first.questions).unwrap(),
        serde_json::to_string(&second.questions).unwrap()
    );
}
