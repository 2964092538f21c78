use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::survey::{FeedbackType, QuestionFeedback, QuestionMetadata, SurveyRecord};

use super::{require_id, AppState, CommandResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySubmitPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub family_id: String,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub responses: BTreeMap<String, String>,
    #[serde(default)]
    pub question_metadata: BTreeMap<String, QuestionMetadata>,
}

pub async fn survey_submit(
    state: &AppState,
    payload: SurveySubmitPayload,
) -> CommandResult<SurveyRecord> {
    require_id("familyId", &payload.family_id)?;
    if payload.responses.is_empty() {
        return Err(AppError::validation("a survey needs at least one response").into());
    }

    let survey = SurveyRecord {
        id: payload
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        family_id: payload.family_id,
        completed_at: payload.completed_at.unwrap_or_else(Utc::now),
        responses: payload.responses,
        question_metadata: payload.question_metadata,
    };
    state.store().save_survey(survey.clone()).await?;
    Ok(survey)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmitPayload {
    pub family_id: String,
    pub question_id: String,
    #[serde(default)]
    pub question_text: String,
    pub category: String,
    pub feedback_type: String,
}

pub async fn question_feedback_submit(
    state: &AppState,
    payload: FeedbackSubmitPayload,
) -> CommandResult<QuestionFeedback> {
    require_id("familyId", &payload.family_id)?;
    require_id("questionId", &payload.question_id)?;
    let feedback_type =
        FeedbackType::try_from(payload.feedback_type.as_str()).map_err(AppError::validation)?;

    let feedback = QuestionFeedback {
        family_id: payload.family_id,
        question_id: payload.question_id,
        question_text: payload.question_text,
        category: payload.category,
        feedback_type,
        created_at: Utc::now(),
    };
    state.store().record_feedback(feedback.clone()).await?;
    Ok(feedback)
}
