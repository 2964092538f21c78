use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::db::store::LearningStore;
use crate::error::{AppError, AppResult};
use crate::models::community::{AccuracyRange, AnonymizedContribution, CommunityInsights};
use crate::models::household::TaskCategory;
use crate::models::progress::MaturityLevel;

/// External pool of anonymised family patterns. Implementations must never
/// expose insights before enough distinct families have contributed.
#[async_trait]
pub trait CrossFamilyLearning: Send + Sync {
    async fn contribute(&self, contribution: AnonymizedContribution) -> AppResult<()>;
    async fn aggregated_insights(&self) -> AppResult<Option<CommunityInsights>>;
}

/// Process-local pool keeping the latest contribution per anonymous family.
pub struct InMemoryCommunityPool {
    min_families: usize,
    contributions: RwLock<BTreeMap<String, AnonymizedContribution>>,
}

impl InMemoryCommunityPool {
    pub fn new(min_families: usize) -> Self {
        Self {
            min_families: min_families.max(1),
            contributions: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn family_count(&self) -> usize {
        self.contributions.read().await.len()
    }
}

#[async_trait]
impl CrossFamilyLearning for InMemoryCommunityPool {
    async fn contribute(&self, contribution: AnonymizedContribution) -> AppResult<()> {
        let mut contributions = self.contributions.write().await;
        contributions.insert(contribution.anonymous_id.clone(), contribution);
        Ok(())
    }

    async fn aggregated_insights(&self) -> AppResult<Option<CommunityInsights>> {
        let contributions = self.contributions.read().await;
        if contributions.len() < self.min_families {
            debug!(
                target: "app::community",
                families = contributions.len(),
                required = self.min_families,
                "community insights withheld below family threshold"
            );
            return Ok(None);
        }

        let mut insights = CommunityInsights {
            family_count: contributions.len(),
            ..Default::default()
        };
        let mut level_sum = 0u32;
        for contribution in contributions.values() {
            *insights
                .accuracy_distribution
                .entry(contribution.accuracy_range)
                .or_insert(0) += 1;
            for topic in &contribution.excluded_topics {
                *insights.common_exclusions.entry(topic.clone()).or_insert(0) += 1;
            }
            for category in &contribution.reframing_categories {
                *insights.reframing_hotspots.entry(*category).or_insert(0) += 1;
            }
            level_sum += u32::from(contribution.maturity_level);
        }
        insights.average_maturity_level = level_sum as f64 / contributions.len() as f64;
        Ok(Some(insights))
    }
}

/// One-way family identifier: SHA-256 over id and salt, base64 encoded.
pub fn anonymize_family_id(family_id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(family_id.as_bytes());
    hasher.update(b":");
    hasher.update(salt.as_bytes());
    STANDARD_NO_PAD.encode(hasher.finalize())
}

pub struct CommunityService {
    store: Arc<dyn LearningStore>,
    pool: Arc<dyn CrossFamilyLearning>,
    salt: String,
}

impl CommunityService {
    pub fn new(
        store: Arc<dyn LearningStore>,
        pool: Arc<dyn CrossFamilyLearning>,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            pool,
            salt: salt.into(),
        }
    }

    pub async fn contribute_family_patterns(
        &self,
        family_id: &str,
    ) -> AppResult<AnonymizedContribution> {
        if family_id.trim().is_empty() {
            return Err(AppError::validation("familyId is required"));
        }

        let profile = self
            .store
            .load_learning_profile(family_id)
            .await?
            .unwrap_or_default();
        let latest_accuracy = self
            .store
            .recent_correlation_snapshots(family_id, 1)
            .await?
            .first()
            .map(|snapshot| snapshot.accuracy.overall)
            .unwrap_or(0.0);

        let reframing_categories = profile
            .category_preferences
            .iter()
            .filter(|(_, preference)| preference.needs_reframing)
            .filter_map(|(label, _)| TaskCategory::from_label(label))
            .collect();

        let contribution = AnonymizedContribution {
            anonymous_id: anonymize_family_id(family_id, &self.salt),
            accuracy_range: AccuracyRange::from_accuracy(latest_accuracy),
            maturity_level: MaturityLevel::from_value(profile.highest_level_reached).value(),
            excluded_topics: profile.excluded_topics,
            reframing_categories,
            contributed_at: Utc::now(),
        };

        if let Err(err) = self.store.record_contribution(contribution.clone()).await {
            warn!(
                target: "app::community",
                error = %err,
                "failed to log community contribution"
            );
        }
        self.pool.contribute(contribution.clone()).await?;

        info!(
            target: "app::community",
            anonymous_id = %contribution.anonymous_id,
            "family patterns contributed"
        );
        Ok(contribution)
    }

    pub async fn community_insights(&self) -> AppResult<Option<CommunityInsights>> {
        self.pool.aggregated_insights().await
    }
}
