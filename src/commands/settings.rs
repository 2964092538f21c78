use crate::error::AppError;
use crate::models::settings::CoreSettings;
use crate::services::settings_service::SettingsUpdateInput;

use super::{AppState, CommandError, CommandResult};

pub async fn settings_get(state: &AppState) -> CommandResult<CoreSettings> {
    let service = state.settings();
    run_blocking(move || service.get()).await
}

/// Persists new tunables. Services built from earlier values keep them until
/// the state is rebuilt.
pub async fn settings_update(
    state: &AppState,
    input: SettingsUpdateInput,
) -> CommandResult<CoreSettings> {
    let service = state.settings();
    run_blocking(move || service.update(input)).await
}

async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> Result<T, AppError> + Send + 'static,
) -> CommandResult<T> {
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| CommandError::new("UNKNOWN", format!("settings task failed: {err}"), None))?
        .map_err(CommandError::from)
}
