pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use commands::{AppState, CommandError, CommandResult, StateOverrides};
pub use error::{AppError, AppResult};

use std::path::Path;

/// Opens (and migrates) the database under `data_dir`, installs logging and
/// wires every service.
pub fn bootstrap(data_dir: &Path) -> AppResult<AppState> {
    std::fs::create_dir_all(data_dir)?;
    utils::logger::init_logging(&data_dir.join("logs"))?;
    let pool = db::DbPool::new(data_dir.join("household-balance.sqlite"))?;
    AppState::new(pool)
}
