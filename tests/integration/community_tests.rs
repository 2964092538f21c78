use chrono::{Duration, Utc};
use household_balance_lib::commands::insights::{
    community_insights_get, contribute_family_patterns, run_survey_correlation,
    SurveyCorrelationPayload,
};
use household_balance_lib::commands::survey::{question_feedback_submit, FeedbackSubmitPayload};
use household_balance_lib::commands::AppState;
use household_balance_lib::db::repositories::community_contribution_repository::CommunityContributionRepository;
use household_balance_lib::db::repositories::task_source_repository::TaskSourceRepository;
use household_balance_lib::db::DbPool;
use household_balance_lib::models::community::AccuracyRange;
use household_balance_lib::models::household::{TaskCategory, TaskSourceType};
use household_balance_lib::models::settings::DEFAULT_ANONYMIZATION_SALT;
use household_balance_lib::models::task::RawTaskEvent;
use household_balance_lib::services::community_service::anonymize_family_id;
use tempfile::{tempdir, TempDir};

fn setup() -> (TempDir, DbPool, AppState) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("community.sqlite")).expect("db pool");
    let state = AppState::new(pool.clone()).expect("app state");
    (dir, pool, state)
}

#[tokio::test(flavor = "multi_thread")]
async fn insights_appear_once_enough_families_contribute() {
    let (_dir, _pool, state) = setup();

    for n in 0..4 {
        contribute_family_patterns(&state, format!("family-{n}"))
            .await
            .expect("contribution");
    }
    // Repeat contributions replace, they do not add families.
    contribute_family_patterns(&state, "family-0".to_string())
        .await
        .expect("contribution");
    assert!(community_insights_get(&state).await.expect("insights").is_none());

    contribute_family_patterns(&state, "family-4".to_string())
        .await
        .expect("contribution");
    let insights = community_insights_get(&state)
        .await
        .expect("insights")
        .expect("threshold reached");
    assert_eq!(insights.family_count, 5);
    assert_eq!(insights.accuracy_distribution[&AccuracyRange::Low], 5);
    assert_eq!(insights.average_maturity_level, 1.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn contribution_carries_patterns_without_the_family_id() {
    let (_dir, pool, state) = setup();
    let family = "family-private";

    let now = Utc::now();
    pool.with_connection(|conn| {
        for n in 0..4 {
            let event = RawTaskEvent::new(
                format!("comfort-{n}"),
                family,
                "Comfort after a bad dream",
                now - Duration::days(n + 1),
            )
            .completed_by("Mama");
            TaskSourceRepository::insert(conn, TaskSourceType::Chore, &event)?;
        }
        Ok(())
    })
    .expect("seed chores");

    let responses = [("invisible_parental_1".to_string(), "Papa".to_string())]
        .into_iter()
        .collect();
    run_survey_correlation(
        &state,
        SurveyCorrelationPayload {
            family_id: family.to_string(),
            survey_responses: responses,
            question_map: Default::default(),
        },
    )
    .await
    .expect("correlation");

    for n in 0..2 {
        question_feedback_submit(
            &state,
            FeedbackSubmitPayload {
                family_id: family.to_string(),
                question_id: format!("pets-{n}"),
                question_text: "Who walks the pets?".to_string(),
                category: "Visible Household Tasks".to_string(),
                feedback_type: "not_applicable".to_string(),
            },
        )
        .await
        .expect("feedback");
    }
    household_balance_lib::commands::insights::analyze_feedback_patterns(&state, family.to_string())
        .await
        .expect("patterns");

    let contribution = contribute_family_patterns(&state, family.to_string())
        .await
        .expect("contribution");

    assert_eq!(
        contribution.anonymous_id,
        anonymize_family_id(family, DEFAULT_ANONYMIZATION_SALT)
    );
    let serialized = serde_json::to_string(&contribution).unwrap();
    assert!(!serialized.contains(family));
    assert_eq!(contribution.accuracy_range, AccuracyRange::Low);
    assert_eq!(contribution.excluded_topics, vec!["pets".to_string()]);
    assert_eq!(
        contribution.reframing_categories,
        vec![TaskCategory::InvisibleParental]
    );

    contribute_family_patterns(&state, family.to_string())
        .await
        .expect("second contribution");
    let logged = pool
        .with_connection(|conn| CommunityContributionRepository::count_for(conn, &contribution.anonymous_id))
        .expect("count");
    assert_eq!(logged, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_family_cannot_contribute() {
    let (_dir, _pool, state) = setup();
    let err = contribute_family_patterns(&state, " ".to_string())
        .await
        .expect_err("blank id");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_contributions_are_all_counted() {
    let (_dir, _pool, state) = setup();

    let contributions = futures::future::join_all((0..6).map(|n| {
        let state = state.clone();
        async move { contribute_family_patterns(&state, format!("family-{n}")).await }
    }))
    .await;
    assert!(contributions.iter().all(Result::is_ok));

    let insights = community_insights_get(&state)
        .await
        .expect("insights")
        .expect("threshold reached");
    assert_eq!(insights.family_count, 6);
}
