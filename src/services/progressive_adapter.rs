use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::db::store::LearningStore;
use crate::error::AppResult;
use crate::models::correlation::CorrelationSnapshot;
use crate::models::household::TaskCategory;
use crate::models::learning::FamilyLearningProfile;
use crate::models::progress::{
    AdaptationStrategy, AdaptedQuestion, Complexity, FamilyProgressProfile, MaturityLevel,
    MetaQuestion, MetaQuestionType, ProgressiveQuestion, ProgressiveQuestionSet, RatingScale,
};
use crate::models::survey::SurveyQuestion;
use crate::utils::stats::{mean, round1};
use crate::utils::text::core_task;

const SURVEY_HISTORY: usize = 10;
const CORRELATION_HISTORY: usize = 5;
const EFFECTIVENESS_HISTORY: usize = 3;
const MIN_SURVEYS: usize = 3;
const READY_ACCURACY: f64 = 70.0;
const STRENGTH_ACCURACY: f64 = 80.0;
const CHALLENGE_ACCURACY: f64 = 60.0;
const RELEVANT_WEIGHT: f64 = 10.0;
const MAX_SUGGESTED_ACTIONS: usize = 2;

/// Accuracy and improvement a family needs to hold `level`.
fn gate(level: MaturityLevel) -> (f64, i32) {
    match level {
        MaturityLevel::Awareness => (0.0, i32::MIN),
        MaturityLevel::Recognition => (60.0, i32::MIN),
        MaturityLevel::Planning => (70.0, 1),
        MaturityLevel::Implementation => (80.0, 2),
        MaturityLevel::Optimization => (90.0, 3),
    }
}

/// Highest level whose gate, and every gate below it, is satisfied.
pub fn gated_level(surveys_completed: usize, average_accuracy: f64, improvement_rate: i32) -> MaturityLevel {
    if surveys_completed < MIN_SURVEYS {
        return MaturityLevel::Awareness;
    }
    let mut level = MaturityLevel::Awareness;
    while let Some(next) = level.next() {
        let (accuracy, improvement) = gate(next);
        if average_accuracy < accuracy || improvement_rate < improvement {
            break;
        }
        level = next;
    }
    level
}

pub fn ready_to_progress(
    level: MaturityLevel,
    surveys_completed: usize,
    average_accuracy: f64,
    improvement_rate: i32,
) -> bool {
    let Some(next) = level.next() else {
        return false;
    };
    if surveys_completed < MIN_SURVEYS || average_accuracy < READY_ACCURACY {
        return false;
    }
    if level >= MaturityLevel::Planning {
        return improvement_rate >= gate(next).1;
    }
    true
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn get_adaptation_strategy(level: MaturityLevel) -> AdaptationStrategy {
    match level {
        MaturityLevel::Awareness => AdaptationStrategy {
            focus: "discovery".to_string(),
            question_types: strings(&["who_does_what", "frequency", "visibility"]),
            complexity: Complexity::Simple,
            follow_ups: false,
            action_oriented: false,
            emphasis_areas: strings(&["basic_distribution", "task_awareness"]),
        },
        MaturityLevel::Recognition => AdaptationStrategy {
            focus: "understanding".to_string(),
            question_types: strings(&["imbalance_awareness", "impact_assessment", "preference"]),
            complexity: Complexity::Moderate,
            follow_ups: true,
            action_oriented: false,
            emphasis_areas: strings(&["workload_impact", "emotional_burden", "time_allocation"]),
        },
        MaturityLevel::Planning => AdaptationStrategy {
            focus: "strategizing".to_string(),
            question_types: strings(&[
                "redistribution_options",
                "barrier_identification",
                "goal_setting",
            ]),
            complexity: Complexity::Complex,
            follow_ups: true,
            action_oriented: true,
            emphasis_areas: strings(&[
                "change_readiness",
                "capability_assessment",
                "priority_setting",
            ]),
        },
        MaturityLevel::Implementation => AdaptationStrategy {
            focus: "execution".to_string(),
            question_types: strings(&["progress_tracking", "challenge_solving", "adjustment_needs"]),
            complexity: Complexity::Advanced,
            follow_ups: true,
            action_oriented: true,
            emphasis_areas: strings(&["habit_formation", "accountability", "fine_tuning"]),
        },
        MaturityLevel::Optimization => AdaptationStrategy {
            focus: "mastery".to_string(),
            question_types: strings(&["sustainability", "efficiency", "satisfaction_metrics"]),
            complexity: Complexity::Expert,
            follow_ups: true,
            action_oriented: true,
            emphasis_areas: strings(&[
                "continuous_improvement",
                "family_culture",
                "long_term_balance",
            ]),
        },
    }
}

fn questions_per_category(level: MaturityLevel) -> usize {
    match level {
        MaturityLevel::Awareness => 5,
        MaturityLevel::Recognition => 4,
        MaturityLevel::Planning | MaturityLevel::Implementation => 3,
        MaturityLevel::Optimization => 2,
    }
}

pub fn reframe_question(level: MaturityLevel, text: &str) -> String {
    let core = core_task(text);
    match level {
        MaturityLevel::Awareness => text.to_string(),
        MaturityLevel::Recognition => format!(
            "Thinking about the past month, who handles {core}? How does this impact your family?"
        ),
        MaturityLevel::Planning => format!(
            "If you could change one thing about how {core} is handled, what would it be and why?"
        ),
        MaturityLevel::Implementation => format!(
            "Since your last survey, how has the responsibility for {core} changed? \
             What's working or not working?"
        ),
        MaturityLevel::Optimization => {
            format!("To maintain balance in {core}, what systems or routines have you established?")
        }
    }
}

fn follow_up_templates(level: MaturityLevel) -> &'static [&'static str] {
    match level {
        MaturityLevel::Awareness => &[],
        MaturityLevel::Recognition => &[
            "How satisfied are you with this arrangement?",
            "Does this distribution feel fair to everyone?",
            "What would need to change for this to feel more balanced?",
        ],
        MaturityLevel::Planning => &[
            "What specific steps could redistribute this responsibility?",
            "What barriers prevent change in this area?",
            "Who else could help with this task?",
        ],
        MaturityLevel::Implementation => &[
            "What progress have you made on redistributing this task?",
            "What unexpected challenges have you encountered?",
            "How can you maintain this change long-term?",
        ],
        MaturityLevel::Optimization => &[
            "How can you make this process more efficient?",
            "What would make this sustainable for the next year?",
            "How does this fit into your family's overall rhythm?",
        ],
    }
}

pub fn suggested_actions(level: MaturityLevel, category: TaskCategory) -> Vec<String> {
    if level < MaturityLevel::Planning {
        return Vec::new();
    }

    let mut actions: Vec<&str> = if category.is_invisible() {
        vec![
            "Create a visible tracking system for this task",
            "Schedule a family meeting to discuss this responsibility",
        ]
    } else {
        vec![
            "Try alternating this responsibility weekly",
            "Teach other family members how to do this task",
        ]
    };
    if level >= MaturityLevel::Implementation {
        actions.extend([
            "Set a specific goal for redistributing this task",
            "Track completion for one week to establish baseline",
            "Create a checklist or guide for this task",
        ]);
    }
    if level >= MaturityLevel::Optimization {
        actions.extend([
            "Automate or streamline parts of this process",
            "Document your successful approach for consistency",
            "Mentor children in age-appropriate aspects of this task",
        ]);
    }

    actions
        .into_iter()
        .take(MAX_SUGGESTED_ACTIONS)
        .map(str::to_string)
        .collect()
}

fn contextual_explanation(base: &str, level: MaturityLevel, challenges: &[TaskCategory]) -> String {
    let context = match level {
        MaturityLevel::Awareness => " Understanding current patterns is the first step.",
        MaturityLevel::Recognition => {
            " Recognizing imbalances helps identify opportunities for change."
        }
        MaturityLevel::Planning => " Planning specific changes makes redistribution achievable.",
        MaturityLevel::Implementation => " Tracking progress helps maintain positive changes.",
        MaturityLevel::Optimization => " Fine-tuning ensures long-term sustainability.",
    };
    let mut explanation = format!("{base}{context}");
    if let Some(challenge) = challenges.first() {
        explanation.push_str(&format!(
            " This is especially important for your family's work on {challenge}."
        ));
    }
    explanation
}

fn meta_questions(profile: &FamilyProgressProfile) -> Vec<MetaQuestion> {
    let level = profile.current_level;
    let mut questions = Vec::new();

    if level >= MaturityLevel::Recognition {
        let options = if profile.challenges.is_empty() {
            TaskCategory::ALL.iter().map(|c| c.as_str().to_string()).collect()
        } else {
            profile.challenges.iter().map(|c| c.as_str().to_string()).collect()
        };
        questions.push(MetaQuestion {
            id: String::new(),
            text: "Which area of task distribution causes the most stress in your family?"
                .to_string(),
            category: "Meta-Analysis".to_string(),
            question_type: MetaQuestionType::Ranking,
            options,
            scale: None,
        });
    }
    if level >= MaturityLevel::Planning {
        questions.push(MetaQuestion {
            id: String::new(),
            text: "What's your family's top priority for improving balance this month?".to_string(),
            category: "Goal Setting".to_string(),
            question_type: MetaQuestionType::Select,
            options: profile.focus_areas.clone(),
            scale: None,
        });
    }
    if level >= MaturityLevel::Implementation {
        questions.push(MetaQuestion {
            id: String::new(),
            text: "Rate your progress on redistributing tasks since last survey".to_string(),
            category: "Progress Tracking".to_string(),
            question_type: MetaQuestionType::Scale,
            options: Vec::new(),
            scale: Some(RatingScale {
                min: 1,
                max: 10,
                labels: ["No progress".to_string(), "Significant progress".to_string()],
            }),
        });
    }

    for (index, question) in questions.iter_mut().enumerate() {
        question.id = format!("level-{}-{}", level.value(), index + 1);
    }
    questions
}

fn mentions_focus(text: &str, focus_areas: &[String]) -> bool {
    let lower = text.to_lowercase();
    focus_areas
        .iter()
        .any(|area| lower.contains(&area.to_lowercase()))
}

fn is_relevant(question: &SurveyQuestion, profile: &FamilyProgressProfile) -> bool {
    profile.challenges.contains(&question.category)
        || question.total_weight > RELEVANT_WEIGHT
        || mentions_focus(&question.text, &profile.focus_areas)
}

/// Meta questions first, then focus-area matches, then descending weight.
fn order_questions(questions: &mut [ProgressiveQuestion], focus_areas: &[String]) {
    let rank = |question: &ProgressiveQuestion| -> (u8, f64) {
        match question {
            ProgressiveQuestion::Meta(_) => (0, 0.0),
            ProgressiveQuestion::Adapted(adapted) => {
                let focused = mentions_focus(&adapted.text, focus_areas)
                    || mentions_focus(adapted.category.as_str(), focus_areas);
                (if focused { 1 } else { 2 }, adapted.total_weight)
            }
            ProgressiveQuestion::Base(base) => (2, base.total_weight),
        }
    };
    questions.sort_by(|left, right| {
        let (left_tier, left_weight) = rank(left);
        let (right_tier, right_weight) = rank(right);
        left_tier.cmp(&right_tier).then_with(|| {
            right_weight
                .partial_cmp(&left_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
}

fn dedup_push(target: &mut Vec<TaskCategory>, category: TaskCategory) {
    if !target.contains(&category) {
        target.push(category);
    }
}

fn strengths_and_challenges(
    snapshots: &[CorrelationSnapshot],
) -> (Vec<TaskCategory>, Vec<TaskCategory>) {
    let mut strengths = Vec::new();
    let mut challenges = Vec::new();
    for snapshot in snapshots {
        for (category, accuracy) in &snapshot.accuracy.by_category {
            if *accuracy > STRENGTH_ACCURACY {
                dedup_push(&mut strengths, *category);
            } else if *accuracy < CHALLENGE_ACCURACY {
                dedup_push(&mut challenges, *category);
            }
        }
    }
    (strengths, challenges)
}

pub struct ProgressiveSurveyAdapter {
    store: Arc<dyn LearningStore>,
    rng: Mutex<StdRng>,
}

impl ProgressiveSurveyAdapter {
    pub fn new(store: Arc<dyn LearningStore>) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic follow-up selection for reproducible question sets.
    pub fn with_seed(store: Arc<dyn LearningStore>, seed: u64) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Read-only: identical history always yields the same profile.
    pub async fn assess_family_progress(&self, family_id: &str) -> AppResult<FamilyProgressProfile> {
        let surveys = self.store.recent_surveys(family_id, SURVEY_HISTORY).await?;
        let snapshots = self
            .store
            .recent_correlation_snapshots(family_id, CORRELATION_HISTORY)
            .await?;
        let analyses = self
            .store
            .recent_effectiveness_analyses(family_id, EFFECTIVENESS_HISTORY)
            .await?;
        let highest_served = self
            .store
            .load_learning_profile(family_id)
            .await?
            .map(|profile| profile.highest_level_reached)
            .unwrap_or(0);

        let surveys_completed = surveys.len();
        let accuracies: Vec<f64> = snapshots
            .iter()
            .map(|snapshot| snapshot.accuracy.overall)
            .collect();
        let average_accuracy = round1(mean(&accuracies));
        // Analyses arrive newest first.
        let improvement_rate = match (analyses.first(), analyses.last()) {
            (Some(newest), Some(oldest)) => {
                newest.overall_impact.net_improvement - oldest.overall_impact.net_improvement
            }
            _ => 0,
        };

        let mut current_level = gated_level(surveys_completed, average_accuracy, improvement_rate);
        if highest_served > current_level.value() {
            current_level = MaturityLevel::from_value(highest_served);
        }

        let (strengths, challenges) = strengths_and_challenges(&snapshots);
        let mut focus_areas: Vec<String> = challenges
            .iter()
            .take(2)
            .map(|category| category.as_str().to_string())
            .collect();
        if current_level >= MaturityLevel::Planning {
            focus_areas.push("Creating sustainable systems".to_string());
        }
        if current_level >= MaturityLevel::Implementation {
            focus_areas.push("Habit formation".to_string());
        }

        let profile = FamilyProgressProfile {
            current_level,
            surveys_completed,
            average_accuracy,
            improvement_rate,
            ready_to_progress: ready_to_progress(
                current_level,
                surveys_completed,
                average_accuracy,
                improvement_rate,
            ),
            strengths,
            challenges,
            focus_areas,
        };

        debug!(
            target: "app::progression",
            family_id,
            level = profile.current_level.value(),
            ready = profile.ready_to_progress,
            "family progress assessed"
        );
        Ok(profile)
    }

    pub fn get_adaptation_strategy(&self, level: MaturityLevel) -> AdaptationStrategy {
        get_adaptation_strategy(level)
    }

    /// Level-adapted question set for the week. Falls back to the base
    /// questions when the family's history cannot be read.
    pub async fn get_progressive_questions(
        &self,
        family_id: &str,
        base_questions: &[SurveyQuestion],
        week_number: u32,
    ) -> ProgressiveQuestionSet {
        let profile = match self.assess_family_progress(family_id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(
                    target: "app::progression",
                    family_id,
                    error = %err,
                    "progress assessment failed, serving base questions"
                );
                return ProgressiveQuestionSet {
                    family_id: family_id.to_string(),
                    week_number,
                    level: None,
                    strategy: None,
                    questions: base_questions
                        .iter()
                        .cloned()
                        .map(ProgressiveQuestion::Base)
                        .collect(),
                };
            }
        };

        let level = profile.current_level;
        let strategy = get_adaptation_strategy(level);
        let per_category = questions_per_category(level);

        let mut grouped: BTreeMap<TaskCategory, Vec<&SurveyQuestion>> = BTreeMap::new();
        for question in base_questions {
            grouped.entry(question.category).or_default().push(question);
        }

        let mut questions: Vec<ProgressiveQuestion> = meta_questions(&profile)
            .into_iter()
            .map(ProgressiveQuestion::Meta)
            .collect();
        for group in grouped.values() {
            for question in group
                .iter()
                .filter(|question| is_relevant(question, &profile))
                .take(per_category)
            {
                let adapted = self.adapt_question(question, &profile, &strategy);
                questions.push(ProgressiveQuestion::Adapted(adapted));
            }
        }
        order_questions(&mut questions, &profile.focus_areas);

        info!(
            target: "app::progression",
            family_id,
            week_number,
            level = level.value(),
            questions = questions.len(),
            "progressive question set built"
        );

        let mut served = FamilyLearningProfile::new(family_id);
        served.highest_level_reached = level.value();
        if let Err(err) = self.store.merge_learning_profile(family_id, served).await {
            warn!(
                target: "app::progression",
                family_id,
                error = %err,
                "failed to record served maturity level"
            );
        }

        ProgressiveQuestionSet {
            family_id: family_id.to_string(),
            week_number,
            level: Some(level),
            strategy: Some(strategy),
            questions,
        }
    }

    fn adapt_question(
        &self,
        question: &SurveyQuestion,
        profile: &FamilyProgressProfile,
        strategy: &AdaptationStrategy,
    ) -> AdaptedQuestion {
        let level = profile.current_level;
        let follow_up = if strategy.follow_ups {
            self.pick_follow_up(level)
        } else {
            None
        };
        let suggested_actions = if strategy.action_oriented {
            suggested_actions(level, question.category)
        } else {
            Vec::new()
        };

        AdaptedQuestion {
            id: question.id.clone(),
            text: reframe_question(level, &question.text),
            original_text: question.text.clone(),
            category: question.category,
            total_weight: question.total_weight,
            explanation: contextual_explanation(&question.explanation, level, &profile.challenges),
            level_adapted: level,
            follow_up,
            suggested_actions,
        }
    }

    fn pick_follow_up(&self, level: MaturityLevel) -> Option<String> {
        let mut rng = self.rng.lock().ok()?;
        follow_up_templates(level)
            .choose(&mut *rng)
            .map(|template| template.to_string())
    }
}
