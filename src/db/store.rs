//! Async facade over the SQLite repositories. Repository calls are blocking,
//! so every operation hops onto the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::repositories::community_contribution_repository::CommunityContributionRepository;
use crate::db::repositories::correlation_repository::CorrelationRepository;
use crate::db::repositories::effectiveness_repository::EffectivenessRepository;
use crate::db::repositories::learning_pattern_repository::LearningPatternRepository;
use crate::db::repositories::question_feedback_repository::QuestionFeedbackRepository;
use crate::db::repositories::survey_repository::SurveyRepository;
use crate::db::repositories::task_source_repository::TaskSourceRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::community::AnonymizedContribution;
use crate::models::correlation::CorrelationSnapshot;
use crate::models::effectiveness::StoredEffectivenessAnalysis;
use crate::models::household::TaskSourceType;
use crate::models::learning::FamilyLearningProfile;
use crate::models::survey::{QuestionFeedback, QuestionMetadata, SurveyRecord};
use crate::models::task::RawTaskEvent;

/// Persistent learning state: append-only collections filtered by family,
/// plus merge-by-key for the learning profile.
#[async_trait]
pub trait LearningStore: Send + Sync {
    async fn find_survey(&self, survey_id: &str) -> AppResult<Option<SurveyRecord>>;
    async fn save_survey(&self, survey: SurveyRecord) -> AppResult<()>;
    async fn recent_surveys(&self, family_id: &str, limit: usize) -> AppResult<Vec<SurveyRecord>>;
    async fn find_question_metadata(
        &self,
        family_id: &str,
        question_id: &str,
    ) -> AppResult<Option<QuestionMetadata>>;

    async fn save_correlation_snapshot(&self, snapshot: CorrelationSnapshot) -> AppResult<()>;
    async fn recent_correlation_snapshots(
        &self,
        family_id: &str,
        limit: usize,
    ) -> AppResult<Vec<CorrelationSnapshot>>;

    async fn save_effectiveness_analysis(
        &self,
        analysis: StoredEffectivenessAnalysis,
    ) -> AppResult<()>;
    async fn recent_effectiveness_analyses(
        &self,
        family_id: &str,
        limit: usize,
    ) -> AppResult<Vec<StoredEffectivenessAnalysis>>;

    async fn load_learning_profile(&self, family_id: &str)
        -> AppResult<Option<FamilyLearningProfile>>;
    async fn merge_learning_profile(
        &self,
        family_id: &str,
        update: FamilyLearningProfile,
    ) -> AppResult<FamilyLearningProfile>;

    async fn record_feedback(&self, feedback: QuestionFeedback) -> AppResult<()>;
    async fn family_feedback(&self, family_id: &str) -> AppResult<Vec<QuestionFeedback>>;
    async fn question_feedback(&self, question_id: &str) -> AppResult<Vec<QuestionFeedback>>;

    async fn record_contribution(&self, contribution: AnonymizedContribution) -> AppResult<()>;
}

/// One of the independent completion-event feeds.
#[async_trait]
pub trait TaskEventSource: Send + Sync {
    fn source_type(&self) -> TaskSourceType;

    async fn completed_between(
        &self,
        family_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<RawTaskEvent>>;
}

async fn blocking<F, T>(db: &Arc<DbPool>, operation: F) -> AppResult<T>
where
    F: FnOnce(&rusqlite::Connection) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || {
        let conn = db
            .get_connection()
            .map_err(|err| AppError::store_unavailable(err.to_string()))?;
        operation(&conn)
    })
    .await?
}

#[derive(Clone)]
pub struct SqliteLearningStore {
    db: Arc<DbPool>,
}

impl SqliteLearningStore {
    pub fn new(db: DbPool) -> Self {
        Self { db: Arc::new(db) }
    }
}

#[async_trait]
impl LearningStore for SqliteLearningStore {
    async fn find_survey(&self, survey_id: &str) -> AppResult<Option<SurveyRecord>> {
        let survey_id = survey_id.to_string();
        blocking(&self.db, move |conn| SurveyRepository::find_by_id(conn, &survey_id)).await
    }

    async fn save_survey(&self, survey: SurveyRecord) -> AppResult<()> {
        blocking(&self.db, move |conn| SurveyRepository::insert(conn, &survey)).await
    }

    async fn recent_surveys(&self, family_id: &str, limit: usize) -> AppResult<Vec<SurveyRecord>> {
        let family_id = family_id.to_string();
        blocking(&self.db, move |conn| {
            SurveyRepository::list_recent(conn, &family_id, limit)
        })
        .await
    }

    async fn find_question_metadata(
        &self,
        family_id: &str,
        question_id: &str,
    ) -> AppResult<Option<QuestionMetadata>> {
        let family_id = family_id.to_string();
        let question_id = question_id.to_string();
        blocking(&self.db, move |conn| {
            SurveyRepository::find_question_metadata(conn, &family_id, &question_id)
        })
        .await
    }

    async fn save_correlation_snapshot(&self, snapshot: CorrelationSnapshot) -> AppResult<()> {
        blocking(&self.db, move |conn| CorrelationRepository::insert(conn, &snapshot)).await
    }

    async fn recent_correlation_snapshots(
        &self,
        family_id: &str,
        limit: usize,
    ) -> AppResult<Vec<CorrelationSnapshot>> {
        let family_id = family_id.to_string();
        blocking(&self.db, move |conn| {
            CorrelationRepository::list_recent(conn, &family_id, limit)
        })
        .await
    }

    async fn save_effectiveness_analysis(
        &self,
        analysis: StoredEffectivenessAnalysis,
    ) -> AppResult<()> {
        blocking(&self.db, move |conn| {
            EffectivenessRepository::upsert(conn, &analysis)
        })
        .await
    }

    async fn recent_effectiveness_analyses(
        &self,
        family_id: &str,
        limit: usize,
    ) -> AppResult<Vec<StoredEffectivenessAnalysis>> {
        let family_id = family_id.to_string();
        blocking(&self.db, move |conn| {
            EffectivenessRepository::list_recent(conn, &family_id, limit)
        })
        .await
    }

    async fn load_learning_profile(
        &self,
        family_id: &str,
    ) -> AppResult<Option<FamilyLearningProfile>> {
        let family_id = family_id.to_string();
        blocking(&self.db, move |conn| {
            LearningPatternRepository::find(conn, &family_id)
        })
        .await
    }

    async fn merge_learning_profile(
        &self,
        family_id: &str,
        update: FamilyLearningProfile,
    ) -> AppResult<FamilyLearningProfile> {
        let family_id = family_id.to_string();
        blocking(&self.db, move |conn| {
            LearningPatternRepository::merge(conn, &family_id, &update)
        })
        .await
    }

    async fn record_feedback(&self, feedback: QuestionFeedback) -> AppResult<()> {
        blocking(&self.db, move |conn| {
            QuestionFeedbackRepository::insert(conn, &feedback).map(|_| ())
        })
        .await
    }

    async fn family_feedback(&self, family_id: &str) -> AppResult<Vec<QuestionFeedback>> {
        let family_id = family_id.to_string();
        blocking(&self.db, move |conn| {
            QuestionFeedbackRepository::list_by_family(conn, &family_id)
        })
        .await
    }

    async fn question_feedback(&self, question_id: &str) -> AppResult<Vec<QuestionFeedback>> {
        let question_id = question_id.to_string();
        blocking(&self.db, move |conn| {
            QuestionFeedbackRepository::list_by_question(conn, &question_id)
        })
        .await
    }

    async fn record_contribution(&self, contribution: AnonymizedContribution) -> AppResult<()> {
        blocking(&self.db, move |conn| {
            CommunityContributionRepository::insert(conn, &contribution).map(|_| ())
        })
        .await
    }
}

/// Task events read from one SQLite source table.
#[derive(Clone)]
pub struct SqliteTaskEventSource {
    db: Arc<DbPool>,
    source_type: TaskSourceType,
}

impl SqliteTaskEventSource {
    pub fn new(db: DbPool, source_type: TaskSourceType) -> Self {
        Self {
            db: Arc::new(db),
            source_type,
        }
    }
}

#[async_trait]
impl TaskEventSource for SqliteTaskEventSource {
    fn source_type(&self) -> TaskSourceType {
        self.source_type
    }

    async fn completed_between(
        &self,
        family_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<RawTaskEvent>> {
        let family_id = family_id.to_string();
        let source = self.source_type;
        blocking(&self.db, move |conn| {
            TaskSourceRepository::list_completed(conn, source, &family_id, &start, &end)
        })
        .await
    }
}
