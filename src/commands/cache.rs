use serde::Serialize;
use tracing::info;

use super::{AppState, CommandResult};

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearResult {
    pub question_scores_cleared: usize,
}

/// Drops memoised question scores so the next lookups read the store.
pub async fn cache_clear_all(state: &AppState) -> CommandResult<CacheClearResult> {
    let cache = state.effectiveness_cache();
    let result = CacheClearResult {
        question_scores_cleared: cache.len(),
    };
    cache.clear();
    info!(
        target: "app::command",
        cleared = result.question_scores_cleared,
        "caches cleared"
    );
    Ok(result)
}
