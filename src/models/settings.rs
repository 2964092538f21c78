use serde::{Deserialize, Serialize};

pub const DEFAULT_AGGREGATION_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_EFFECTIVENESS_DAYS_TO_TRACK: i64 = 30;
pub const DEFAULT_TOP_PERFORMER_LIMIT: usize = 5;
pub const DEFAULT_EFFECTIVENESS_CACHE_CAPACITY: usize = 256;
pub const DEFAULT_COMMUNITY_MIN_FAMILIES: usize = 5;
pub const DEFAULT_ANONYMIZATION_SALT: &str = "household-balance";

/// Tunables shared by the analysis services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoreSettings {
    pub aggregation_window_days: i64,
    pub effectiveness_days_to_track: i64,
    pub top_performer_limit: usize,
    pub effectiveness_cache_capacity: usize,
    pub community_min_families: usize,
    #[serde(skip_serializing, default = "default_salt")]
    pub anonymization_salt: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_salt() -> String {
    DEFAULT_ANONYMIZATION_SALT.to_string()
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            aggregation_window_days: DEFAULT_AGGREGATION_WINDOW_DAYS,
            effectiveness_days_to_track: DEFAULT_EFFECTIVENESS_DAYS_TO_TRACK,
            top_performer_limit: DEFAULT_TOP_PERFORMER_LIMIT,
            effectiveness_cache_capacity: DEFAULT_EFFECTIVENESS_CACHE_CAPACITY,
            community_min_families: DEFAULT_COMMUNITY_MIN_FAMILIES,
            anonymization_salt: DEFAULT_ANONYMIZATION_SALT.to_string(),
            updated_at: None,
        }
    }
}
