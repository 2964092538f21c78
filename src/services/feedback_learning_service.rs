use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::db::store::LearningStore;
use crate::error::AppResult;
use crate::models::learning::{
    CategoryApplicability, CategoryPreference, FamilyLearningProfile, FeedbackPatterns,
    HighValueQuestion, QuestionEffectivenessScore,
};
use crate::models::survey::{FeedbackType, QuestionFeedback, SurveyQuestion};
use crate::services::cache::EffectivenessScoreCache;
use crate::services::classifier::TopicMatcher;
use crate::utils::stats::ratio;

const EMPHASIZE_ABOVE: f64 = 0.7;
const DEEMPHASIZE_BELOW: f64 = 0.3;
const EXCLUDE_BELOW: f64 = 0.2;
const EXCLUDE_MIN_SAMPLES: u32 = 5;
const NEUTRAL_SCORE: f64 = 0.5;
const FEEDBACK_SATURATION: f64 = 10.0;
const FAMILY_SATURATION: f64 = 5.0;

/// Keyword groups a family can rank; each hit scales by the family's weight
/// for the group.
const PRIORITY_GROUPS: [(&str, [&str; 5]); 4] = [
    (
        "invisible parental",
        ["emotional", "anticipate", "mental load", "remember", "coordinate"],
    ),
    (
        "mental load",
        ["planning", "organizing", "remembering", "scheduling", "tracking"],
    ),
    (
        "emotional labor",
        ["emotional", "support", "feelings", "comfort", "wellbeing"],
    ),
    (
        "household equality",
        ["cleaning", "cooking", "laundry", "dishes", "chores"],
    ),
];

#[derive(Default)]
struct Tally {
    applicable: u32,
    not_applicable: u32,
}

impl Tally {
    fn add(&mut self, feedback_type: FeedbackType) {
        match feedback_type {
            FeedbackType::Applicable => self.applicable += 1,
            FeedbackType::NotApplicable => self.not_applicable += 1,
        }
    }

    fn total(&self) -> u32 {
        self.applicable + self.not_applicable
    }

    fn rate(&self) -> f64 {
        ratio(self.applicable as usize, self.total() as usize)
    }
}

pub struct FeedbackLearningService {
    store: Arc<dyn LearningStore>,
    topics: Arc<dyn TopicMatcher>,
    cache: Arc<EffectivenessScoreCache>,
}

impl FeedbackLearningService {
    pub fn new(
        store: Arc<dyn LearningStore>,
        topics: Arc<dyn TopicMatcher>,
        cache: Arc<EffectivenessScoreCache>,
    ) -> Self {
        Self {
            store,
            topics,
            cache,
        }
    }

    pub fn cache(&self) -> &EffectivenessScoreCache {
        &self.cache
    }

    /// Mines the family's applicability feedback and merges the result into
    /// its learning profile.
    pub async fn analyze_feedback_patterns(&self, family_id: &str) -> AppResult<FeedbackPatterns> {
        let feedback = self.store.family_feedback(family_id).await?;
        let patterns = mine_feedback(family_id, &feedback, self.topics.as_ref());

        info!(
            target: "app::feedback",
            family_id,
            feedback = feedback.len(),
            excluded_categories = patterns.excluded_categories.len(),
            excluded_topics = patterns.excluded_topics.len(),
            "feedback patterns analysed"
        );

        if let Err(err) = self
            .store
            .merge_learning_profile(family_id, profile_update(&patterns))
            .await
        {
            warn!(
                target: "app::feedback",
                family_id,
                error = %err,
                "failed to store feedback patterns"
            );
        }

        Ok(patterns)
    }

    /// Cross-family applicability score. Read failures yield the neutral
    /// score and are not memoised.
    pub async fn get_question_effectiveness(&self, question_id: &str) -> QuestionEffectivenessScore {
        let key = question_id.to_string();
        if let Some(score) = self.cache.get(&key) {
            debug!(target: "app::feedback", question_id, "effectiveness cache hit");
            return score;
        }

        match self.store.question_feedback(question_id).await {
            Ok(feedback) => {
                let score = score_question(question_id, &feedback);
                self.cache.insert(key, score.clone());
                score
            }
            Err(err) => {
                warn!(
                    target: "app::feedback",
                    question_id,
                    error = %err,
                    "question feedback unavailable, using neutral score"
                );
                neutral_score(question_id)
            }
        }
    }

    pub fn calculate_question_priority(
        &self,
        question: &SurveyQuestion,
        family_priorities: &BTreeMap<String, f64>,
        patterns: Option<&FeedbackPatterns>,
    ) -> f64 {
        calculate_question_priority(question, family_priorities, patterns)
    }
}

pub fn mine_feedback(
    family_id: &str,
    feedback: &[QuestionFeedback],
    topics: &dyn TopicMatcher,
) -> FeedbackPatterns {
    let mut by_category: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_topic: BTreeMap<&'static str, Tally> = BTreeMap::new();
    let mut high_value_questions = Vec::new();
    let mut seen_questions = BTreeSet::new();

    for entry in feedback {
        by_category
            .entry(entry.category.clone())
            .or_default()
            .add(entry.feedback_type);

        for topic in topics.matches(&entry.question_text) {
            by_topic.entry(topic).or_default().add(entry.feedback_type);
        }

        if entry.feedback_type == FeedbackType::Applicable
            && seen_questions.insert(entry.question_id.clone())
        {
            high_value_questions.push(HighValueQuestion {
                question_id: entry.question_id.clone(),
                question_text: entry.question_text.clone(),
                category: entry.category.clone(),
            });
        }
    }

    let mut patterns = FeedbackPatterns {
        family_id: family_id.to_string(),
        high_value_questions,
        ..Default::default()
    };

    for (category, tally) in by_category {
        let rate = tally.rate();
        if rate < EXCLUDE_BELOW && tally.total() > EXCLUDE_MIN_SAMPLES {
            patterns.excluded_categories.push(category.clone());
        }
        patterns.category_preferences.insert(
            category,
            CategoryApplicability {
                applicable: tally.applicable,
                not_applicable: tally.not_applicable,
                total: tally.total(),
                applicability_rate: rate,
                should_emphasize: rate > EMPHASIZE_ABOVE,
                should_deemphasize: rate < DEEMPHASIZE_BELOW,
            },
        );
    }

    for topic in topics.topics() {
        let Some(tally) = by_topic.get(topic) else {
            continue;
        };
        if tally.total() > 0 && tally.rate() < EXCLUDE_BELOW {
            patterns.excluded_topics.push(topic.to_string());
            patterns.family_specific_insights.insert(
                topic.to_string(),
                format!("This family doesn't find {topic}-related questions applicable"),
            );
        }
    }

    patterns
}

fn profile_update(patterns: &FeedbackPatterns) -> FamilyLearningProfile {
    let mut update = FamilyLearningProfile::new(patterns.family_id.clone());
    update.category_preferences = patterns
        .category_preferences
        .iter()
        .map(|(category, applicability)| {
            (
                category.clone(),
                CategoryPreference {
                    applicability_rate: Some(applicability.applicability_rate),
                    total_questions: Some(applicability.total),
                    should_emphasize: applicability.should_emphasize,
                    should_deemphasize: applicability.should_deemphasize,
                    ..Default::default()
                },
            )
        })
        .collect();
    update.excluded_categories = patterns.excluded_categories.clone();
    update.excluded_topics = patterns.excluded_topics.clone();
    update.family_specific_insights = patterns.family_specific_insights.clone();
    update.high_value_questions = patterns.high_value_questions.clone();
    update.updated_at = Some(Utc::now());
    update
}

fn neutral_score(question_id: &str) -> QuestionEffectivenessScore {
    QuestionEffectivenessScore {
        question_id: question_id.to_string(),
        total_feedback: 0,
        applicable_count: 0,
        not_applicable_count: 0,
        applicability_rate: NEUTRAL_SCORE,
        family_count: 0,
        effectiveness_score: NEUTRAL_SCORE,
    }
}

pub fn score_question(question_id: &str, feedback: &[QuestionFeedback]) -> QuestionEffectivenessScore {
    if feedback.is_empty() {
        return neutral_score(question_id);
    }

    let mut tally = Tally::default();
    let mut families = BTreeSet::new();
    for entry in feedback {
        tally.add(entry.feedback_type);
        families.insert(entry.family_id.as_str());
    }

    let total = tally.total();
    let applicability_rate = tally.rate();
    let volume = (total as f64 / FEEDBACK_SATURATION).min(1.0);
    let reach = (families.len() as f64 / FAMILY_SATURATION).min(1.0);
    let effectiveness_score = (0.6 * applicability_rate + 0.2 * volume + 0.2 * reach).clamp(0.0, 1.0);

    QuestionEffectivenessScore {
        question_id: question_id.to_string(),
        total_feedback: total,
        applicable_count: tally.applicable,
        not_applicable_count: tally.not_applicable,
        applicability_rate,
        family_count: families.len() as u32,
        effectiveness_score,
    }
}

/// Base 0.5, raised by family-ranked keyword groups found in the question
/// text and shifted by the category's learned emphasis. Clamped to `[0, 1]`.
pub fn calculate_question_priority(
    question: &SurveyQuestion,
    family_priorities: &BTreeMap<String, f64>,
    patterns: Option<&FeedbackPatterns>,
) -> f64 {
    let text = question.text.to_lowercase();
    let mut priority = NEUTRAL_SCORE;

    for (group, keywords) in PRIORITY_GROUPS {
        let Some(weight) = family_priorities.get(group) else {
            continue;
        };
        let matches = keywords.iter().filter(|keyword| text.contains(*keyword)).count();
        priority += 0.2 * matches as f64 * weight;
    }

    if let Some(preference) =
        patterns.and_then(|patterns| patterns.category_preferences.get(question.category.as_str()))
    {
        if preference.should_emphasize {
            priority += 0.3;
        } else if preference.should_deemphasize {
            priority -= 0.3;
        }
    }

    priority.clamp(0.0, 1.0)
}
