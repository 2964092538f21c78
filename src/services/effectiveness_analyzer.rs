use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::db::store::LearningStore;
use crate::error::{AppError, AppResult};
use crate::models::aggregate::AggregatedStats;
use crate::models::effectiveness::{
    CategoryEffectiveness, ChangeMetrics, EffectivenessAnalysis, EffectivenessInsight,
    EffectivenessInsightKind, EffectivenessPatterns, EffectivenessRecord, ImpactLevel,
    ImpactTrend, InsightTone, KeywordFrequency, OverallImpact, QuestionCharacteristics,
    RedistributionQuality, StoredEffectivenessAnalysis, TopPerformer,
};
use crate::models::household::{HouseholdRole, TaskCategory};
use crate::models::survey::SurveyRecord;
use crate::services::correlation_service::{
    infer_category_from_question_id, PRIMARY_DOER_THRESHOLD,
};
use crate::services::task_aggregator::TaskCompletionAggregator;
use crate::utils::stats::{imbalance, mean, percentage, round1};
use crate::utils::text::distinct_keywords;

const MODERATE_SHIFT: f64 = 5.0;
const SIGNIFICANT_SHIFT: f64 = 10.0;
const BALANCE_MARGIN: f64 = 5.0;
const NEAR_BALANCE: f64 = 10.0;
const EFFECTIVE_SCORE: f64 = 40.0;
const TOP_KEYWORDS: usize = 5;

pub struct QuestionEffectivenessAnalyzer {
    store: Arc<dyn LearningStore>,
    aggregator: Arc<TaskCompletionAggregator>,
}

impl QuestionEffectivenessAnalyzer {
    pub fn new(store: Arc<dyn LearningStore>, aggregator: Arc<TaskCompletionAggregator>) -> Self {
        Self { store, aggregator }
    }

    /// Measures how task shares moved in the `days_to_track` days on either
    /// side of the survey and scores every role-valued answer by the change
    /// that followed it.
    pub async fn analyze_question_effectiveness(
        &self,
        family_id: &str,
        survey_id: &str,
        days_to_track: i64,
        top_n: usize,
    ) -> AppResult<EffectivenessAnalysis> {
        if days_to_track <= 0 {
            return Err(AppError::validation("daysToTrack must be positive"));
        }

        let survey = self
            .store
            .find_survey(survey_id)
            .await?
            .filter(|survey| survey.family_id == family_id)
            .ok_or_else(|| AppError::not_found("survey", survey_id))?;

        let pivot = survey.completed_at;
        let (before_start, after_end) = Duration::try_days(days_to_track)
            .and_then(|window| {
                Some((pivot.checked_sub_signed(window)?, pivot.checked_add_signed(window)?))
            })
            .ok_or_else(|| AppError::validation("daysToTrack is out of range"))?;
        // Stored timestamps carry millisecond precision; the survey instant
        // belongs to the after window only.
        let before_end = pivot - Duration::milliseconds(1);
        let (before, after) = tokio::join!(
            self.aggregator
                .get_task_completion_data(family_id, Some(before_start), Some(before_end)),
            self.aggregator
                .get_task_completion_data(family_id, Some(pivot), Some(after_end)),
        );

        let question_effectiveness = analyze_questions(&survey, &before, &after);
        let patterns = identify_patterns(&question_effectiveness);
        let overall_impact = overall_impact(&before, &after);
        let top_performers = top_performers(&question_effectiveness, top_n);
        let insights = generate_insights(&question_effectiveness, &patterns);

        info!(
            target: "app::effectiveness",
            family_id,
            survey_id,
            questions = question_effectiveness.len(),
            trend = ?overall_impact.overall_trend,
            "question effectiveness analysed"
        );

        let stored = StoredEffectivenessAnalysis {
            family_id: family_id.to_string(),
            survey_id: survey_id.to_string(),
            question_effectiveness: question_effectiveness.clone(),
            patterns: patterns.clone(),
            overall_impact: overall_impact.clone(),
            analysis_date: Utc::now(),
        };
        if let Err(err) = self.store.save_effectiveness_analysis(stored).await {
            warn!(
                target: "app::effectiveness",
                family_id,
                survey_id,
                error = %err,
                "failed to persist effectiveness analysis"
            );
        }

        Ok(EffectivenessAnalysis {
            family_id: family_id.to_string(),
            survey_id: survey_id.to_string(),
            question_effectiveness,
            patterns,
            top_performers,
            insights,
            overall_impact,
        })
    }

    /// Most recent stored analyses, newest first.
    pub async fn get_historical_effectiveness(
        &self,
        family_id: &str,
        limit: usize,
    ) -> AppResult<Vec<StoredEffectivenessAnalysis>> {
        self.store.recent_effectiveness_analyses(family_id, limit).await
    }
}

fn analyze_questions(
    survey: &SurveyRecord,
    before: &AggregatedStats,
    after: &AggregatedStats,
) -> BTreeMap<String, EffectivenessRecord> {
    let mut records = BTreeMap::new();
    for (question_id, answer) in &survey.responses {
        let Some(role) = HouseholdRole::parse(answer) else {
            continue;
        };
        let metadata = survey.question_metadata.get(question_id);
        let Some(category) = metadata
            .and_then(|metadata| metadata.task_category())
            .or_else(|| infer_category_from_question_id(question_id))
        else {
            continue;
        };

        let change_metrics = change_metrics(category, &role, before, after);
        let effectiveness_score = effectiveness_score(&change_metrics);
        records.insert(
            question_id.clone(),
            EffectivenessRecord {
                question_id: question_id.clone(),
                question_text: metadata
                    .and_then(|metadata| metadata.text.clone())
                    .unwrap_or_default(),
                category,
                survey_response: role,
                behavior_change: change_metrics.redistribution_occurred,
                impact: ImpactLevel::from_score(effectiveness_score),
                change_metrics,
                effectiveness_score,
            },
        );
    }
    records
}

fn distribution(stats: &AggregatedStats, category: TaskCategory) -> BTreeMap<HouseholdRole, f64> {
    stats
        .category(category)
        .map(|stat| stat.role_distribution())
        .unwrap_or_default()
}

/// Per-role shift of the category share between the two windows. The role
/// set is the answered role plus every role seen in either window; balance
/// is judged over the observed roles only.
pub fn change_metrics(
    category: TaskCategory,
    answered: &HouseholdRole,
    before: &AggregatedStats,
    after: &AggregatedStats,
) -> ChangeMetrics {
    let mut before_distribution = distribution(before, category);
    let mut after_distribution = distribution(after, category);

    let observed: BTreeSet<HouseholdRole> = before_distribution
        .keys()
        .chain(after_distribution.keys())
        .cloned()
        .collect();
    let mut roles = observed.clone();
    roles.insert(answered.clone());
    for role in &roles {
        before_distribution.entry(role.clone()).or_insert(0.0);
        after_distribution.entry(role.clone()).or_insert(0.0);
    }

    let changes: BTreeMap<HouseholdRole, f64> = roles
        .iter()
        .map(|role| {
            let delta = after_distribution[role] - before_distribution[role];
            (role.clone(), round1(delta))
        })
        .collect();
    let absolute_change = round1(changes.values().map(|delta| delta.abs()).sum());

    let answered_before = before_distribution[answered];
    let answered_delta = changes[answered];
    let (redistribution_occurred, redistribution_quality) =
        if answered_before > PRIMARY_DOER_THRESHOLD && answered_delta < -MODERATE_SHIFT {
            let quality = if answered_delta < -SIGNIFICANT_SHIFT {
                RedistributionQuality::Significant
            } else {
                RedistributionQuality::Moderate
            };
            (true, quality)
        } else {
            (false, RedistributionQuality::None)
        };

    let before_imbalance = imbalance(observed.iter().map(|role| &before_distribution[role]));
    let final_imbalance = imbalance(observed.iter().map(|role| &after_distribution[role]));
    let imbalance_reduction = round1(before_imbalance - final_imbalance);

    ChangeMetrics {
        before_distribution,
        after_distribution,
        changes,
        absolute_change,
        redistribution_occurred,
        redistribution_quality,
        balance_improved: final_imbalance < before_imbalance - BALANCE_MARGIN,
        imbalance_reduction,
        final_imbalance: round1(final_imbalance),
    }
}

/// 0-100 score of how strongly behaviour moved after the question.
pub fn effectiveness_score(metrics: &ChangeMetrics) -> f64 {
    let mut score = 0.0;

    score += match metrics.redistribution_quality {
        RedistributionQuality::Significant => 40.0,
        RedistributionQuality::Moderate => 25.0,
        RedistributionQuality::None => 0.0,
    };
    if metrics.balance_improved {
        score += (metrics.imbalance_reduction * 2.0).min(30.0);
    }
    if metrics.absolute_change > MODERATE_SHIFT {
        score += metrics.absolute_change.min(20.0);
    }
    if metrics.final_imbalance < NEAR_BALANCE {
        score += 10.0;
    }

    score.clamp(0.0, 100.0)
}

fn identify_patterns(records: &BTreeMap<String, EffectivenessRecord>) -> EffectivenessPatterns {
    let mut patterns = EffectivenessPatterns::default();
    let mut high = Vec::new();
    let mut low = Vec::new();

    for (question_id, record) in records {
        match record.impact {
            ImpactLevel::High => {
                patterns.high_impact_questions.push(question_id.clone());
                high.push(record);
            }
            ImpactLevel::Low | ImpactLevel::Minimal => {
                patterns.low_impact_questions.push(question_id.clone());
                low.push(record);
            }
            ImpactLevel::Medium => {}
        }

        let category = patterns
            .category_effectiveness
            .entry(record.category)
            .or_default();
        category.total += 1;
        if record.effectiveness_score > EFFECTIVE_SCORE {
            category.effective += 1;
        }
        category.scores.push(record.effectiveness_score);

        patterns
            .response_type_effectiveness
            .entry(record.survey_response.clone())
            .or_default()
            .push(record.effectiveness_score);
    }

    for category in patterns.category_effectiveness.values_mut() {
        finalize_category(category);
    }

    patterns.high_impact_characteristics = characteristics(&high);
    patterns.low_impact_characteristics = characteristics(&low);

    if let Some(high_traits) = &patterns.high_impact_characteristics {
        let low_words: BTreeSet<String> = low
            .iter()
            .flat_map(|record| distinct_keywords(&record.question_text))
            .collect();
        patterns.distinguishing_keywords = high_traits
            .top_keywords
            .iter()
            .filter(|keyword| !low_words.contains(&keyword.word))
            .map(|keyword| keyword.word.clone())
            .collect();
    }

    patterns
}

fn finalize_category(category: &mut CategoryEffectiveness) {
    category.average_score = round1(mean(&category.scores));
    category.effectiveness_rate = round1(percentage(
        category.effective as f64,
        category.total as f64,
    ));
}

fn characteristics(records: &[&EffectivenessRecord]) -> Option<QuestionCharacteristics> {
    if records.is_empty() {
        return None;
    }

    let mut word_counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut categories: BTreeMap<TaskCategory, u32> = BTreeMap::new();
    let mut text_length = 0usize;

    for record in records {
        for word in distinct_keywords(&record.question_text) {
            *word_counts.entry(word).or_insert(0) += 1;
        }
        *categories.entry(record.category).or_insert(0) += 1;
        text_length += record.question_text.chars().count();
    }

    let count = records.len();
    let mut ranked: Vec<(String, u32)> = word_counts.into_iter().collect();
    // Stable sort keeps the alphabetical order of the map among ties.
    ranked.sort_by(|left, right| right.1.cmp(&left.1));

    Some(QuestionCharacteristics {
        question_count: count,
        average_text_length: round1(text_length as f64 / count as f64),
        categories,
        top_keywords: ranked
            .into_iter()
            .take(TOP_KEYWORDS)
            .map(|(word, hits)| KeywordFrequency {
                word,
                frequency: percentage(hits as f64, count as f64).round() as u32,
            })
            .collect(),
    })
}

fn top_performers(records: &BTreeMap<String, EffectivenessRecord>, limit: usize) -> Vec<TopPerformer> {
    let mut ranked: Vec<&EffectivenessRecord> = records.values().collect();
    ranked.sort_by(|left, right| {
        right
            .effectiveness_score
            .partial_cmp(&left.effectiveness_score)
            .unwrap_or(Ordering::Equal)
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|record| TopPerformer {
            question_id: record.question_id.clone(),
            text: record.question_text.clone(),
            score: record.effectiveness_score,
            impact: record.impact,
            category: record.category,
            change_achieved: record.change_metrics.redistribution_occurred,
        })
        .collect()
}

fn generate_insights(
    records: &BTreeMap<String, EffectivenessRecord>,
    patterns: &EffectivenessPatterns,
) -> Vec<EffectivenessInsight> {
    let mut insights = Vec::new();
    if records.is_empty() {
        return insights;
    }

    let effective = records
        .values()
        .filter(|record| record.effectiveness_score > EFFECTIVE_SCORE)
        .count();
    let rate = percentage(effective as f64, records.len() as f64);
    insights.push(EffectivenessInsight {
        kind: EffectivenessInsightKind::Overall,
        category: None,
        message: format!("{rate:.0}% of survey questions led to meaningful behavioral change"),
        effectiveness_rate: Some(round1(rate)),
        tone: if rate > 60.0 {
            InsightTone::Positive
        } else if rate > 30.0 {
            InsightTone::Moderate
        } else {
            InsightTone::Concern
        },
        recommendation: None,
    });

    for (category, data) in &patterns.category_effectiveness {
        if data.effectiveness_rate > 70.0 {
            insights.push(EffectivenessInsight {
                kind: EffectivenessInsightKind::Category,
                category: Some(*category),
                message: format!("Questions about {category} are highly effective at driving change"),
                effectiveness_rate: Some(data.effectiveness_rate),
                tone: InsightTone::Positive,
                recommendation: None,
            });
        } else if data.effectiveness_rate < 30.0 {
            insights.push(EffectivenessInsight {
                kind: EffectivenessInsightKind::Category,
                category: Some(*category),
                message: format!("Questions about {category} rarely lead to behavioral change"),
                effectiveness_rate: Some(data.effectiveness_rate),
                tone: InsightTone::Concern,
                recommendation: Some(
                    "Consider reframing these questions or adding follow-up actions".to_string(),
                ),
            });
        }
    }

    if let Some(high) = patterns
        .high_impact_characteristics
        .as_ref()
        .filter(|high| !high.top_keywords.is_empty())
    {
        let signature = high
            .top_keywords
            .iter()
            .take(3)
            .map(|keyword| keyword.word.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        insights.push(EffectivenessInsight {
            kind: EffectivenessInsightKind::Pattern,
            category: None,
            message: format!("Effective questions often include: {signature}"),
            effectiveness_rate: None,
            tone: InsightTone::Informative,
            recommendation: None,
        });
    }

    let redistributed = records.values().filter(|record| record.behavior_change).count();
    if redistributed > 0 {
        insights.push(EffectivenessInsight {
            kind: EffectivenessInsightKind::Behavior,
            category: None,
            message: format!("{redistributed} questions directly led to task redistribution"),
            effectiveness_rate: None,
            tone: InsightTone::Positive,
            recommendation: None,
        });
    }

    insights
}

/// Net imbalance change over the categories observed in both windows.
pub fn overall_impact(before: &AggregatedStats, after: &AggregatedStats) -> OverallImpact {
    let mut impact = OverallImpact::default();
    let mut total_reduction = 0.0;

    for (category, before_stat) in &before.by_category {
        let Some(after_stat) = after.category(*category) else {
            continue;
        };
        let mut before_shares = before_stat.role_distribution();
        let mut after_shares = after_stat.role_distribution();
        let roles: Vec<HouseholdRole> = before_shares
            .keys()
            .chain(after_shares.keys())
            .cloned()
            .collect();
        for role in roles {
            before_shares.entry(role.clone()).or_insert(0.0);
            after_shares.entry(role).or_insert(0.0);
        }

        let change = imbalance(before_shares.values()) - imbalance(after_shares.values());
        total_reduction += change;
        if change > BALANCE_MARGIN {
            impact.categories_improved += 1;
        } else if change < -BALANCE_MARGIN {
            impact.categories_worsened += 1;
        }
    }

    impact.total_imbalance_reduction = round1(total_reduction);
    impact.net_improvement = impact.categories_improved as i32 - impact.categories_worsened as i32;
    impact.overall_trend = match impact.categories_improved.cmp(&impact.categories_worsened) {
        Ordering::Greater => ImpactTrend::Positive,
        Ordering::Less => ImpactTrend::Negative,
        Ordering::Equal => ImpactTrend::Neutral,
    };
    impact
}
