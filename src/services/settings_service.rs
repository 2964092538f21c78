use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use serde::Deserialize;
use tracing::{info, warn};

use crate::db::repositories::settings_repository::{SettingRow, SettingsRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::settings::CoreSettings;

const KEY_AGGREGATION_WINDOW: &str = "aggregation_window_days";
const KEY_EFFECTIVENESS_DAYS: &str = "effectiveness_days_to_track";
const KEY_TOP_PERFORMERS: &str = "top_performer_limit";
const KEY_CACHE_CAPACITY: &str = "effectiveness_cache_capacity";
const KEY_MIN_FAMILIES: &str = "community_min_families";
const KEY_SALT: &str = "anonymization_salt";

const MIN_COMMUNITY_FAMILIES: usize = 2;
const MAX_WINDOW_DAYS: i64 = 3_650;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdateInput {
    pub aggregation_window_days: Option<i64>,
    pub effectiveness_days_to_track: Option<i64>,
    pub top_performer_limit: Option<usize>,
    pub effectiveness_cache_capacity: Option<usize>,
    pub community_min_families: Option<usize>,
    pub anonymization_salt: Option<String>,
}

pub struct SettingsService {
    db: DbPool,
    cache: RwLock<Option<CoreSettings>>,
}

impl SettingsService {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            cache: RwLock::new(None),
        }
    }

    pub fn get(&self) -> AppResult<CoreSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings_from_db()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<CoreSettings> {
        let mut current = self.get()?;
        let mut changes: Vec<(&str, String)> = Vec::new();

        if let Some(days) = input.aggregation_window_days {
            ensure_positive_days(KEY_AGGREGATION_WINDOW, days)?;
            current.aggregation_window_days = days;
            changes.push((KEY_AGGREGATION_WINDOW, days.to_string()));
        }

        if let Some(days) = input.effectiveness_days_to_track {
            ensure_positive_days(KEY_EFFECTIVENESS_DAYS, days)?;
            current.effectiveness_days_to_track = days;
            changes.push((KEY_EFFECTIVENESS_DAYS, days.to_string()));
        }

        if let Some(limit) = input.top_performer_limit {
            if limit == 0 {
                return Err(AppError::validation("topPerformerLimit must be at least 1"));
            }
            current.top_performer_limit = limit;
            changes.push((KEY_TOP_PERFORMERS, limit.to_string()));
        }

        if let Some(capacity) = input.effectiveness_cache_capacity {
            if capacity == 0 {
                return Err(AppError::validation(
                    "effectivenessCacheCapacity must be at least 1",
                ));
            }
            current.effectiveness_cache_capacity = capacity;
            changes.push((KEY_CACHE_CAPACITY, capacity.to_string()));
        }

        if let Some(families) = input.community_min_families {
            if families < MIN_COMMUNITY_FAMILIES {
                return Err(AppError::validation(format!(
                    "communityMinFamilies must be at least {MIN_COMMUNITY_FAMILIES}"
                )));
            }
            current.community_min_families = families;
            changes.push((KEY_MIN_FAMILIES, families.to_string()));
        }

        if let Some(salt) = input.anonymization_salt.as_ref() {
            let salt = salt.trim();
            if salt.is_empty() {
                return Err(AppError::validation("anonymizationSalt cannot be empty"));
            }
            current.anonymization_salt = salt.to_string();
            changes.push((KEY_SALT, salt.to_string()));
        }

        if changes.is_empty() {
            return Ok(current);
        }

        self.db
            .with_connection(|conn| SettingsRepository::upsert_all(conn, &changes))?;
        let settings = self.load_settings_from_db()?;

        info!(
            target: "app::settings",
            keys = ?changes.iter().map(|(key, _)| *key).collect::<Vec<_>>(),
            "settings updated"
        );

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    fn load_settings_from_db(&self) -> AppResult<CoreSettings> {
        let rows = self.db.with_connection(SettingsRepository::list)?;
        let mut latest_updated_at: Option<String> = None;
        let mut map: HashMap<String, SettingRow> = HashMap::new();
        for row in rows {
            latest_updated_at = match latest_updated_at {
                Some(ref current) if current >= &row.updated_at => Some(current.clone()),
                _ => Some(row.updated_at.clone()),
            };
            map.insert(row.key.clone(), row);
        }

        let defaults = CoreSettings::default();
        Ok(CoreSettings {
            aggregation_window_days: parse_or(
                &map,
                KEY_AGGREGATION_WINDOW,
                defaults.aggregation_window_days,
            ),
            effectiveness_days_to_track: parse_or(
                &map,
                KEY_EFFECTIVENESS_DAYS,
                defaults.effectiveness_days_to_track,
            ),
            top_performer_limit: parse_or(&map, KEY_TOP_PERFORMERS, defaults.top_performer_limit),
            effectiveness_cache_capacity: parse_or(
                &map,
                KEY_CACHE_CAPACITY,
                defaults.effectiveness_cache_capacity,
            ),
            community_min_families: parse_or(
                &map,
                KEY_MIN_FAMILIES,
                defaults.community_min_families,
            ),
            anonymization_salt: map
                .get(KEY_SALT)
                .map(|row| row.value.clone())
                .unwrap_or(defaults.anonymization_salt),
            updated_at: latest_updated_at,
        })
    }
}

fn ensure_positive_days(key: &str, days: i64) -> AppResult<()> {
    if days <= 0 {
        return Err(AppError::validation(format!(
            "{key} must be a positive number of days"
        )));
    }
    if days > MAX_WINDOW_DAYS {
        return Err(AppError::validation(format!(
            "{key} must not exceed {MAX_WINDOW_DAYS} days"
        )));
    }
    Ok(())
}

fn parse_or<T: FromStr>(map: &HashMap<String, SettingRow>, key: &str, fallback: T) -> T {
    match map.get(key) {
        Some(row) => match row.value.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    target: "app::settings",
                    key,
                    value = %row.value,
                    "ignoring malformed setting"
                );
                fallback
            }
        },
        None => fallback,
    }
}
