use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

const STOPWORDS: [&str; 9] = [
    "who", "the", "is", "for", "in", "your", "does", "usually", "typically",
];

static CORE_TASK_PREFIX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^Who (is responsible for|usually|typically|does|handles|manages) ").ok()
});

static LEADING_NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+)").ok());

/// Lowercased words longer than three characters, stopwords removed.
pub fn keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|word| word.trim_matches('\''))
        .filter(|word| word.chars().count() > 3 && !STOPWORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Distinct keywords of `text`, for per-question frequency counting.
pub fn distinct_keywords(text: &str) -> BTreeSet<String> {
    keywords(text).into_iter().collect()
}

/// Strips the leading responsibility boilerplate and the trailing question
/// mark: "Who handles the dishes?" becomes "the dishes".
pub fn core_task(question: &str) -> String {
    let stripped = match CORE_TASK_PREFIX.as_ref() {
        Some(pattern) => pattern.replace(question, "").into_owned(),
        None => question.to_string(),
    };
    stripped
        .strip_suffix('?')
        .map(str::to_string)
        .unwrap_or(stripped)
}

/// First run of digits in an identifier such as `q42`.
pub fn numeric_id(identifier: &str) -> Option<u32> {
    LEADING_NUMBER
        .as_ref()?
        .captures(identifier)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
