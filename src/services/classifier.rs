use crate::models::household::TaskCategory;
use crate::utils::text::contains_any;

/// Maps free text (task title and description) to a labor category.
pub trait CategoryClassifier: Send + Sync {
    fn classify(&self, text: &str) -> TaskCategory;
}

/// Finds the topics a piece of question text touches.
pub trait TopicMatcher: Send + Sync {
    fn topics(&self) -> &[&'static str];

    fn matches(&self, text: &str) -> Vec<&'static str>;
}

const KEYWORD_RULES: [(&[&str], TaskCategory); 5] = [
    (
        &["cook", "meal", "dinner", "breakfast", "lunch"],
        TaskCategory::VisibleHousehold,
    ),
    (
        &["plan", "schedule", "organize", "budget", "research"],
        TaskCategory::InvisibleHousehold,
    ),
    (
        &["homework", "school", "drive", "practice", "game"],
        TaskCategory::VisibleParental,
    ),
    (
        &["emotional", "comfort", "talk", "support", "worry"],
        TaskCategory::InvisibleParental,
    ),
    (
        &["clean", "laundry", "dishes", "vacuum", "trash"],
        TaskCategory::VisibleHousehold,
    ),
];

/// Substring rules checked in order; the first hit wins and anything
/// unmatched is visible household work.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl CategoryClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> TaskCategory {
        let lower = text.to_lowercase();
        KEYWORD_RULES
            .iter()
            .find(|(keywords, _)| contains_any(&lower, keywords))
            .map(|(_, category)| *category)
            .unwrap_or(TaskCategory::VisibleHousehold)
    }
}

pub const DEFAULT_TOPICS: [&str; 11] = [
    "technology",
    "snow",
    "yard",
    "pets",
    "financial",
    "school",
    "doctor",
    "cooking",
    "cleaning",
    "emotional",
    "planning",
];

#[derive(Debug, Clone)]
pub struct KeywordTopicMatcher {
    topics: Vec<&'static str>,
}

impl KeywordTopicMatcher {
    pub fn new(topics: Vec<&'static str>) -> Self {
        Self { topics }
    }
}

impl Default for KeywordTopicMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TOPICS.to_vec())
    }
}

impl TopicMatcher for KeywordTopicMatcher {
    fn topics(&self) -> &[&'static str] {
        &self.topics
    }

    fn matches(&self, text: &str) -> Vec<&'static str> {
        let lower = text.to_lowercase();
        self.topics
            .iter()
            .copied()
            .filter(|topic| lower.contains(topic))
            .collect()
    }
}
