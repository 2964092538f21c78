use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::store::LearningStore;
use crate::models::aggregate::{AggregatedStats, CategoryStat};
use crate::models::correlation::{
    CategoryAnalysis, CorrelationAccuracy, CorrelationEntry, CorrelationSnapshot, Insight,
    InsightKind, Priority, Recommendation, RoleShareSummary,
};
use crate::models::household::{HouseholdRole, PrimaryDoer, TaskCategory};
use crate::models::learning::{CategoryPreference, CorrelationHistoryEntry, FamilyLearningProfile};
use crate::models::survey::QuestionMetadata;
use crate::services::task_aggregator::TaskCompletionAggregator;
use crate::utils::stats::{format1, percentage, round1};
use crate::utils::text::numeric_id;

/// Share above which a single role is the category's primary doer.
pub const PRIMARY_DOER_THRESHOLD: f64 = 65.0;
const IMBALANCE_THRESHOLD: f64 = 75.0;
const HIDDEN_WORK_THRESHOLD: f64 = 50.0;
const PERCEPTION_GAP_THRESHOLD: f64 = 30.0;
const REFRAMING_THRESHOLD: f64 = 50.0;

pub type QuestionMap = BTreeMap<String, QuestionMetadata>;

pub struct CorrelationService {
    store: Arc<dyn LearningStore>,
    aggregator: Arc<TaskCompletionAggregator>,
}

impl CorrelationService {
    pub fn new(store: Arc<dyn LearningStore>, aggregator: Arc<TaskCompletionAggregator>) -> Self {
        Self { store, aggregator }
    }

    /// Compares role-valued survey answers with the trailing window of
    /// observed completions, persists the snapshot and feeds the learning
    /// profile. Persistence failures are logged; the snapshot is still
    /// returned.
    pub async fn track_response_task_correlation(
        &self,
        family_id: &str,
        survey_responses: &BTreeMap<String, String>,
        question_map: &QuestionMap,
    ) -> CorrelationSnapshot {
        let stats = self
            .aggregator
            .get_task_completion_data(family_id, None, None)
            .await;

        let mut entries = Vec::new();
        for (question_id, answer) in survey_responses {
            let Some(role) = HouseholdRole::parse(answer) else {
                continue;
            };
            let Some((category, question_text)) =
                self.resolve_question(family_id, question_id, question_map).await
            else {
                debug!(target: "app::correlation", question_id, "question category unresolved");
                continue;
            };
            let Some(category_stat) = stats.category(category).filter(|stat| stat.total > 0) else {
                continue;
            };
            if let Some(entry) =
                correlate_answer(question_id, question_text, category, role, category_stat)
            {
                entries.push(entry);
            }
        }

        let snapshot = build_snapshot(family_id, survey_responses.len(), &stats, entries);

        info!(
            target: "app::correlation",
            family_id,
            accuracy = snapshot.accuracy.overall,
            matches = snapshot.matches.len(),
            mismatches = snapshot.mismatches.len(),
            "survey-task correlation complete"
        );

        if let Err(err) = self.store.save_correlation_snapshot(snapshot.clone()).await {
            warn!(
                target: "app::correlation",
                family_id,
                error = %err,
                "failed to persist correlation snapshot"
            );
        }

        let update = learning_update(family_id, &snapshot);
        if let Err(err) = self.store.merge_learning_profile(family_id, update).await {
            warn!(
                target: "app::correlation",
                family_id,
                error = %err,
                "failed to update learning profile from correlation"
            );
        }

        snapshot
    }

    async fn resolve_question(
        &self,
        family_id: &str,
        question_id: &str,
        question_map: &QuestionMap,
    ) -> Option<(TaskCategory, String)> {
        if let Some(metadata) = question_map.get(question_id) {
            if let Some(category) = metadata.task_category() {
                return Some((category, metadata.text.clone().unwrap_or_default()));
            }
        }

        let stored = match self.store.find_question_metadata(family_id, question_id).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    target: "app::correlation",
                    family_id,
                    question_id,
                    error = %err,
                    "question metadata lookup failed"
                );
                None
            }
        };

        let text = stored
            .as_ref()
            .and_then(|metadata| metadata.text.clone())
            .unwrap_or_default();
        stored
            .as_ref()
            .and_then(QuestionMetadata::task_category)
            .or_else(|| infer_category_from_question_id(question_id))
            .map(|category| (category, text))
    }
}

/// Identifier heuristic: explicit visible/invisible + household/parental
/// markers first, then the numeric ranges of the base question bank.
pub fn infer_category_from_question_id(question_id: &str) -> Option<TaskCategory> {
    let lower = question_id.to_lowercase();
    let parental = lower.contains("parental");
    let household = lower.contains("household");
    if lower.contains("invisible") {
        if parental {
            return Some(TaskCategory::InvisibleParental);
        }
        if household {
            return Some(TaskCategory::InvisibleHousehold);
        }
    } else if lower.contains("visible") {
        if parental {
            return Some(TaskCategory::VisibleParental);
        }
        if household {
            return Some(TaskCategory::VisibleHousehold);
        }
    }

    match numeric_id(question_id)? {
        1..=55 => Some(TaskCategory::VisibleHousehold),
        56..=105 => Some(TaskCategory::InvisibleHousehold),
        106..=155 => Some(TaskCategory::VisibleParental),
        156..=205 => Some(TaskCategory::InvisibleParental),
        _ => None,
    }
}

/// Role holding more than the threshold share, otherwise shared.
pub fn primary_doer(category_stat: &CategoryStat) -> PrimaryDoer {
    category_stat
        .role_shares()
        .into_iter()
        .find(|(_, share)| share.percentage > PRIMARY_DOER_THRESHOLD)
        .map(|(role, _)| PrimaryDoer::Role(role))
        .unwrap_or(PrimaryDoer::Shared)
}

fn correlate_answer(
    question_id: &str,
    question_text: String,
    category: TaskCategory,
    answer: HouseholdRole,
    category_stat: &CategoryStat,
) -> Option<CorrelationEntry> {
    let shares = category_stat.role_shares();
    if shares.values().all(|share| share.count == 0) {
        return None;
    }

    let actual_primary_doer = primary_doer(category_stat);
    let is_match = match &actual_primary_doer {
        PrimaryDoer::Shared => true,
        PrimaryDoer::Role(role) => *role == answer,
    };

    let percentages = shares
        .into_iter()
        .map(|(role, share)| {
            (
                role,
                RoleShareSummary {
                    count: share.count,
                    weight: share.weight,
                    percentage: format1(share.percentage),
                },
            )
        })
        .collect();

    Some(CorrelationEntry {
        question_id: question_id.to_string(),
        question_text,
        category,
        survey_answer: answer,
        actual_primary_doer,
        is_match,
        percentages,
    })
}

fn build_snapshot(
    family_id: &str,
    survey_response_count: usize,
    stats: &AggregatedStats,
    entries: Vec<CorrelationEntry>,
) -> CorrelationSnapshot {
    let mut category_analysis: BTreeMap<TaskCategory, CategoryAnalysis> = BTreeMap::new();
    let mut matches = Vec::new();
    let mut mismatches = Vec::new();

    for entry in entries {
        let analysis = category_analysis.entry(entry.category).or_default();
        analysis.total += 1;
        if entry.is_match {
            analysis.matches += 1;
        }
        *analysis
            .survey_tendency
            .entry(entry.survey_answer.clone())
            .or_insert(0) += 1;
        if let PrimaryDoer::Role(role) = &entry.actual_primary_doer {
            *analysis.actual_tendency.entry(role.clone()).or_insert(0) += 1;
        }

        if entry.is_match {
            matches.push(entry);
        } else {
            mismatches.push(entry);
        }
    }

    let total = matches.len() + mismatches.len();
    let accuracy = CorrelationAccuracy {
        overall: round1(percentage(matches.len() as f64, total as f64)),
        by_category: category_analysis
            .iter()
            .map(|(category, analysis)| {
                (
                    *category,
                    round1(percentage(analysis.matches as f64, analysis.total as f64)),
                )
            })
            .collect(),
    };

    let mut snapshot = CorrelationSnapshot {
        id: Uuid::new_v4().to_string(),
        family_id: family_id.to_string(),
        timestamp: Utc::now(),
        survey_response_count,
        task_completion_count: stats.total_tasks,
        date_range: stats.date_range,
        accuracy,
        matches,
        mismatches,
        category_analysis,
        insights: Vec::new(),
        recommendations: Vec::new(),
    };

    generate_insights(&mut snapshot, stats);
    snapshot
}

fn generate_insights(snapshot: &mut CorrelationSnapshot, stats: &AggregatedStats) {
    let overall = snapshot.accuracy.overall;

    if overall >= 80.0 {
        snapshot.insights.push(
            Insight::new(
                InsightKind::Positive,
                "Excellent alignment between survey responses and actual task completion",
                Priority::High,
            )
            .with_accuracy(overall),
        );
    } else if overall >= 60.0 {
        snapshot.insights.push(
            Insight::new(
                InsightKind::Neutral,
                "Moderate alignment between perceptions and reality",
                Priority::Medium,
            )
            .with_accuracy(overall),
        );
        snapshot.recommendations.push(Recommendation {
            priority: Priority::Medium,
            category: None,
            action: "Schedule a family meeting to review task assignments".to_string(),
            reason: "Some discrepancies exist between who family members think does tasks \
                     and who actually completes them"
                .to_string(),
        });
    } else {
        snapshot.insights.push(
            Insight::new(
                InsightKind::Concern,
                "Significant gap between perceived and actual task distribution",
                Priority::High,
            )
            .with_accuracy(overall),
        );
        snapshot.recommendations.push(Recommendation {
            priority: Priority::High,
            category: None,
            action: "Urgent family discussion needed about task responsibilities".to_string(),
            reason: "Large disconnect between survey responses and actual behavior indicates \
                     communication issues"
                .to_string(),
        });
    }

    let mut imbalanced: BTreeSet<TaskCategory> = BTreeSet::new();
    for mismatch in &snapshot.mismatches {
        let dominant = mismatch.dominant_share();
        if dominant <= IMBALANCE_THRESHOLD || !imbalanced.insert(mismatch.category) {
            continue;
        }
        let mut insight = Insight::new(
            InsightKind::Imbalance,
            format!("High imbalance in {}", mismatch.category),
            Priority::High,
        )
        .for_category(mismatch.category);
        insight.perception = Some(format!(
            "Survey indicates {} handles these tasks",
            mismatch.survey_answer
        ));
        insight.reality = Some(format!(
            "Actually {} does {:.0}% of these tasks",
            mismatch.actual_primary_doer, dominant
        ));
        snapshot.insights.push(insight);
        snapshot.recommendations.push(Recommendation {
            priority: Priority::High,
            category: Some(mismatch.category),
            action: format!(
                "Redistribute {} more equitably",
                mismatch.category.as_str().to_lowercase()
            ),
            reason: format!(
                "One person is handling {dominant:.0}% of these tasks, creating an unfair burden"
            ),
        });
    }

    for category in TaskCategory::ALL.into_iter().filter(TaskCategory::is_invisible) {
        let Some(accuracy) = snapshot.accuracy.by_category.get(&category).copied() else {
            continue;
        };
        if accuracy >= HIDDEN_WORK_THRESHOLD {
            continue;
        }
        snapshot.insights.push(
            Insight::new(
                InsightKind::HiddenWork,
                "Low awareness of invisible work distribution",
                Priority::High,
            )
            .for_category(category)
            .with_accuracy(accuracy),
        );
        snapshot.recommendations.push(Recommendation {
            priority: Priority::High,
            category: Some(category),
            action: format!("Create visibility for {}", category.as_str().to_lowercase()),
            reason: "Family members aren't aware of who's actually doing this invisible work"
                .to_string(),
        });
    }

    for (category, analysis) in &snapshot.category_analysis {
        let Some(category_stat) = stats.category(*category) else {
            continue;
        };
        if let Some(insight) = perception_gap(*category, analysis, category_stat) {
            snapshot.insights.push(insight);
        }
    }
}

/// Largest gap, over all roles, between how often the survey names a role
/// and the role's share of every completion in the category, children
/// included.
fn perception_gap(
    category: TaskCategory,
    analysis: &CategoryAnalysis,
    category_stat: &CategoryStat,
) -> Option<Insight> {
    if analysis.total == 0 {
        return None;
    }
    let actual = category_stat.role_distribution();
    let roles: BTreeSet<&HouseholdRole> = analysis
        .survey_tendency
        .keys()
        .chain(actual.keys())
        .collect();

    let (role, surveyed, observed, gap) = roles
        .into_iter()
        .map(|role| {
            let named = analysis.survey_tendency.get(role).copied().unwrap_or(0);
            let surveyed = percentage(named as f64, analysis.total as f64);
            let observed = actual.get(role).copied().unwrap_or(0.0);
            (role, surveyed, observed, (surveyed - observed).abs())
        })
        .max_by(|left, right| left.3.partial_cmp(&right.3).unwrap_or(Ordering::Equal))?;

    if gap <= PERCEPTION_GAP_THRESHOLD {
        return None;
    }

    let mut insight = Insight::new(
        InsightKind::PerceptionGap,
        format!("Large perception gap in {category}"),
        Priority::Medium,
    )
    .for_category(category);
    insight.perception = Some(format!("{surveyed:.0}% of answers name {role}"));
    insight.reality = Some(format!("{role} completes {observed:.0}% of these tasks"));
    insight.gap = Some(gap.round());
    Some(insight)
}

fn learning_update(family_id: &str, snapshot: &CorrelationSnapshot) -> FamilyLearningProfile {
    let mut update = FamilyLearningProfile::new(family_id);
    for (category, accuracy) in &snapshot.accuracy.by_category {
        if *accuracy < REFRAMING_THRESHOLD {
            update.category_preferences.insert(
                category.as_str().to_string(),
                CategoryPreference {
                    needs_reframing: true,
                    last_accuracy: Some(*accuracy),
                    ..Default::default()
                },
            );
        }
    }
    update.correlation_history.push(CorrelationHistoryEntry {
        date: snapshot.timestamp,
        overall_accuracy: snapshot.accuracy.overall,
        insight_count: snapshot.insights.len(),
        recommendation_count: snapshot.recommendations.len(),
    });
    update
}
