use serde::{Deserialize, Serialize};
use std::fmt;

const GUARDIAN_PREFIX: &str = "guardian:";

/// Adult household member a survey answer or a completed task can be
/// attributed to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HouseholdRole {
    Mama,
    Papa,
    Guardian(String),
}

impl HouseholdRole {
    /// Parses a survey answer or a performer label. Answers that do not name
    /// a role ("Both", "Draw", child names, "Unknown") yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "mama" | "mom" | "mother" => Some(HouseholdRole::Mama),
            "papa" | "dad" | "father" => Some(HouseholdRole::Papa),
            _ if lower.starts_with(GUARDIAN_PREFIX) => {
                let name = trimmed[GUARDIAN_PREFIX.len()..].trim();
                if name.is_empty() {
                    None
                } else {
                    Some(HouseholdRole::Guardian(name.to_string()))
                }
            }
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            HouseholdRole::Mama => "Mama".to_string(),
            HouseholdRole::Papa => "Papa".to_string(),
            HouseholdRole::Guardian(name) => format!("{GUARDIAN_PREFIX}{name}"),
        }
    }
}

impl fmt::Display for HouseholdRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl TryFrom<String> for HouseholdRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HouseholdRole::parse(&value).ok_or_else(|| format!("unsupported household role: {value}"))
    }
}

impl From<HouseholdRole> for String {
    fn from(value: HouseholdRole) -> Self {
        value.label()
    }
}

/// Who actually carries a category in a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "role")]
pub enum PrimaryDoer {
    Role(HouseholdRole),
    Shared,
}

impl PrimaryDoer {
    pub fn role(&self) -> Option<&HouseholdRole> {
        match self {
            PrimaryDoer::Role(role) => Some(role),
            PrimaryDoer::Shared => None,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, PrimaryDoer::Shared)
    }
}

impl fmt::Display for PrimaryDoer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryDoer::Role(role) => write!(f, "{role}"),
            PrimaryDoer::Shared => f.write_str("Shared"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskCategory {
    #[serde(rename = "Visible Household Tasks")]
    VisibleHousehold,
    #[serde(rename = "Invisible Household Tasks")]
    InvisibleHousehold,
    #[serde(rename = "Visible Parental Tasks")]
    VisibleParental,
    #[serde(rename = "Invisible Parental Tasks")]
    InvisibleParental,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 4] = [
        TaskCategory::VisibleHousehold,
        TaskCategory::InvisibleHousehold,
        TaskCategory::VisibleParental,
        TaskCategory::InvisibleParental,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::VisibleHousehold => "Visible Household Tasks",
            TaskCategory::InvisibleHousehold => "Invisible Household Tasks",
            TaskCategory::VisibleParental => "Visible Parental Tasks",
            TaskCategory::InvisibleParental => "Invisible Parental Tasks",
        }
    }

    pub fn is_invisible(&self) -> bool {
        matches!(
            self,
            TaskCategory::InvisibleHousehold | TaskCategory::InvisibleParental
        )
    }

    /// Lenient parse accepting the display label as well as snake/kebab forms
    /// such as `invisible_parental`.
    pub fn from_label(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        let normalized = normalized.trim_end_matches(" tasks").trim();
        match normalized {
            "visible household" => Some(TaskCategory::VisibleHousehold),
            "invisible household" => Some(TaskCategory::InvisibleHousehold),
            "visible parental" => Some(TaskCategory::VisibleParental),
            "invisible parental" => Some(TaskCategory::InvisibleParental),
            _ => None,
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskCategory {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        TaskCategory::from_label(value).ok_or_else(|| format!("unsupported task category: {value}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskSourceType {
    Chore,
    Kanban,
    Achievement,
}

impl TaskSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSourceType::Chore => "chore",
            TaskSourceType::Kanban => "kanban",
            TaskSourceType::Achievement => "achievement",
        }
    }
}

impl fmt::Display for TaskSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
