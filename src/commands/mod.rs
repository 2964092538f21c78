pub mod cache;
pub mod insights;
pub mod settings;
pub mod survey;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, warn};

use crate::db::store::{LearningStore, SqliteLearningStore};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::cache::EffectivenessScoreCache;
use crate::services::classifier::{
    CategoryClassifier, KeywordClassifier, KeywordTopicMatcher, TopicMatcher,
};
use crate::services::community_service::{
    CommunityService, CrossFamilyLearning, InMemoryCommunityPool,
};
use crate::services::correlation_service::CorrelationService;
use crate::services::effectiveness_analyzer::QuestionEffectivenessAnalyzer;
use crate::services::feedback_learning_service::FeedbackLearningService;
use crate::services::progressive_adapter::ProgressiveSurveyAdapter;
use crate::services::settings_service::SettingsService;
use crate::services::task_aggregator::{TaskCompletionAggregator, TaskSources};

/// Optional replacements for the default collaborators.
#[derive(Default)]
pub struct StateOverrides {
    pub sources: Option<TaskSources>,
    pub classifier: Option<Arc<dyn CategoryClassifier>>,
    pub topics: Option<Arc<dyn TopicMatcher>>,
    pub community_pool: Option<Arc<dyn CrossFamilyLearning>>,
    pub follow_up_seed: Option<u64>,
}

#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    store: Arc<dyn LearningStore>,
    settings_service: Arc<SettingsService>,
    effectiveness_cache: Arc<EffectivenessScoreCache>,
    aggregator: Arc<TaskCompletionAggregator>,
    correlation_service: Arc<CorrelationService>,
    feedback_service: Arc<FeedbackLearningService>,
    effectiveness_analyzer: Arc<QuestionEffectivenessAnalyzer>,
    progressive_adapter: Arc<ProgressiveSurveyAdapter>,
    community_service: Arc<CommunityService>,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> AppResult<Self> {
        Self::with_overrides(db_pool, StateOverrides::default())
    }

    pub fn with_overrides(db_pool: DbPool, overrides: StateOverrides) -> AppResult<Self> {
        let settings_service = Arc::new(SettingsService::new(db_pool.clone()));
        let settings = settings_service.get()?;

        let store: Arc<dyn LearningStore> = Arc::new(SqliteLearningStore::new(db_pool.clone()));
        let sources = overrides
            .sources
            .unwrap_or_else(|| TaskSources::sqlite(&db_pool));
        let classifier = overrides
            .classifier
            .unwrap_or_else(|| Arc::new(KeywordClassifier));
        let topics = overrides
            .topics
            .unwrap_or_else(|| Arc::new(KeywordTopicMatcher::default()));
        let community_pool = overrides.community_pool.unwrap_or_else(|| {
            Arc::new(InMemoryCommunityPool::new(settings.community_min_families))
        });

        let effectiveness_cache = Arc::new(EffectivenessScoreCache::with_capacity(
            settings.effectiveness_cache_capacity,
        ));
        let aggregator = Arc::new(TaskCompletionAggregator::new(
            sources,
            classifier,
            settings.aggregation_window_days,
        ));
        let correlation_service = Arc::new(CorrelationService::new(
            Arc::clone(&store),
            Arc::clone(&aggregator),
        ));
        let feedback_service = Arc::new(FeedbackLearningService::new(
            Arc::clone(&store),
            topics,
            Arc::clone(&effectiveness_cache),
        ));
        let effectiveness_analyzer = Arc::new(QuestionEffectivenessAnalyzer::new(
            Arc::clone(&store),
            Arc::clone(&aggregator),
        ));
        let progressive_adapter = Arc::new(match overrides.follow_up_seed {
            Some(seed) => ProgressiveSurveyAdapter::with_seed(Arc::clone(&store), seed),
            None => ProgressiveSurveyAdapter::new(Arc::clone(&store)),
        });
        let community_service = Arc::new(CommunityService::new(
            Arc::clone(&store),
            community_pool,
            settings.anonymization_salt.clone(),
        ));

        Ok(Self {
            db_pool,
            store,
            settings_service,
            effectiveness_cache,
            aggregator,
            correlation_service,
            feedback_service,
            effectiveness_analyzer,
            progressive_adapter,
            community_service,
        })
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }

    pub fn store(&self) -> Arc<dyn LearningStore> {
        Arc::clone(&self.store)
    }

    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings_service)
    }

    pub fn effectiveness_cache(&self) -> Arc<EffectivenessScoreCache> {
        Arc::clone(&self.effectiveness_cache)
    }

    pub fn aggregator(&self) -> Arc<TaskCompletionAggregator> {
        Arc::clone(&self.aggregator)
    }

    pub fn correlation(&self) -> Arc<CorrelationService> {
        Arc::clone(&self.correlation_service)
    }

    pub fn feedback(&self) -> Arc<FeedbackLearningService> {
        Arc::clone(&self.feedback_service)
    }

    pub fn effectiveness(&self) -> Arc<QuestionEffectivenessAnalyzer> {
        Arc::clone(&self.effectiveness_analyzer)
    }

    pub fn progression(&self) -> Arc<ProgressiveSurveyAdapter> {
        Arc::clone(&self.progressive_adapter)
    }

    pub fn community(&self) -> Arc<CommunityService> {
        Arc::clone(&self.community_service)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation {
                message, details, ..
            } => CommandError::new("VALIDATION_ERROR", message, details),
            AppError::NotFound { resource, id } => CommandError::new(
                "NOT_FOUND",
                format!("{resource} not found"),
                Some(serde_json::json!({ "resource": resource, "id": id })),
            ),
            AppError::Conflict { message } => CommandError::new("CONFLICT", message, None),
            AppError::StoreUnavailable(message) => {
                warn!(target: "app::command", %message, "store unavailable in command");
                CommandError::new("STORE_UNAVAILABLE", message, None)
            }
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("UNKNOWN", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", "serialization failed", None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", "filesystem access failed", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}

pub(crate) fn require_id(field: &str, value: &str) -> Result<(), CommandError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required")).into());
    }
    Ok(())
}
