use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::aggregate::AggregatedStats;
use crate::models::community::{AnonymizedContribution, CommunityInsights};
use crate::models::correlation::CorrelationSnapshot;
use crate::models::effectiveness::{EffectivenessAnalysis, StoredEffectivenessAnalysis};
use crate::models::learning::{FeedbackPatterns, QuestionEffectivenessScore};
use crate::models::progress::{FamilyProgressProfile, ProgressiveQuestionSet};
use crate::models::survey::{QuestionMetadata, SurveyQuestion};

use super::{require_id, AppState, CommandResult};

const DEFAULT_HISTORY_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStatsPayload {
    pub family_id: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

pub async fn aggregate_task_stats(
    state: &AppState,
    payload: AggregateStatsPayload,
) -> CommandResult<AggregatedStats> {
    require_id("familyId", &payload.family_id)?;
    Ok(state
        .aggregator()
        .get_task_completion_data(&payload.family_id, payload.start_date, payload.end_date)
        .await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyCorrelationPayload {
    pub family_id: String,
    pub survey_responses: BTreeMap<String, String>,
    #[serde(default)]
    pub question_map: BTreeMap<String, QuestionMetadata>,
}

pub async fn run_survey_correlation(
    state: &AppState,
    payload: SurveyCorrelationPayload,
) -> CommandResult<CorrelationSnapshot> {
    require_id("familyId", &payload.family_id)?;
    Ok(state
        .correlation()
        .track_response_task_correlation(
            &payload.family_id,
            &payload.survey_responses,
            &payload.question_map,
        )
        .await)
}

pub async fn analyze_feedback_patterns(
    state: &AppState,
    family_id: String,
) -> CommandResult<FeedbackPatterns> {
    require_id("familyId", &family_id)?;
    Ok(state.feedback().analyze_feedback_patterns(&family_id).await?)
}

pub async fn question_effectiveness_get(
    state: &AppState,
    question_id: String,
) -> CommandResult<QuestionEffectivenessScore> {
    require_id("questionId", &question_id)?;
    Ok(state.feedback().get_question_effectiveness(&question_id).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessPayload {
    pub family_id: String,
    pub survey_id: String,
    #[serde(default)]
    pub days_to_track: Option<i64>,
    #[serde(default)]
    pub top_n: Option<usize>,
}

pub async fn run_effectiveness_analysis(
    state: &AppState,
    payload: EffectivenessPayload,
) -> CommandResult<EffectivenessAnalysis> {
    require_id("familyId", &payload.family_id)?;
    require_id("surveyId", &payload.survey_id)?;

    let settings = state.settings().get()?;
    let days = payload
        .days_to_track
        .unwrap_or(settings.effectiveness_days_to_track);
    let top_n = payload.top_n.unwrap_or(settings.top_performer_limit);

    Ok(state
        .effectiveness()
        .analyze_question_effectiveness(&payload.family_id, &payload.survey_id, days, top_n)
        .await?)
}

pub async fn effectiveness_history_get(
    state: &AppState,
    family_id: String,
    limit: Option<usize>,
) -> CommandResult<Vec<StoredEffectivenessAnalysis>> {
    require_id("familyId", &family_id)?;
    Ok(state
        .effectiveness()
        .get_historical_effectiveness(&family_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await?)
}

pub async fn assess_family_progress(
    state: &AppState,
    family_id: String,
) -> CommandResult<FamilyProgressProfile> {
    require_id("familyId", &family_id)?;
    Ok(state.progression().assess_family_progress(&family_id).await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveQuestionPayload {
    pub family_id: String,
    pub base_questions: Vec<SurveyQuestion>,
    #[serde(default)]
    pub week_number: u32,
}

pub async fn get_adaptive_question_set(
    state: &AppState,
    payload: AdaptiveQuestionPayload,
) -> CommandResult<ProgressiveQuestionSet> {
    require_id("familyId", &payload.family_id)?;
    Ok(state
        .progression()
        .get_progressive_questions(&payload.family_id, &payload.base_questions, payload.week_number)
        .await)
}

pub async fn contribute_family_patterns(
    state: &AppState,
    family_id: String,
) -> CommandResult<AnonymizedContribution> {
    require_id("familyId", &family_id)?;
    Ok(state.community().contribute_family_patterns(&family_id).await?)
}

pub async fn community_insights_get(state: &AppState) -> CommandResult<Option<CommunityInsights>> {
    Ok(state.community().community_insights().await?)
}
