use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::AppResult;

const USER_VERSION: i32 = 3;

#[derive(Debug)]
pub struct MigrationInfo {
    pub version: i32,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

pub fn run(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS migration_history (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            rollback_sql TEXT
        );
        "#,
    )?;

    let mut current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version < 1 {
        info!(target: "app::db", version = current_version, "running migration v1");
        migrate_to_v1(conn)?;
        current_version = 1;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(
            conn,
            1,
            "Add task event sources and survey responses",
            Some(
                r#"
                DROP TABLE IF EXISTS question_feedback;
                DROP TABLE IF EXISTS survey_responses;
                DROP TABLE IF EXISTS achievements;
                DROP TABLE IF EXISTS kanban_tasks;
                DROP TABLE IF EXISTS chore_instances;
                "#,
            ),
        )?;
    }

    if current_version < 2 {
        info!(target: "app::db", version = current_version, "running migration v2");
        migrate_to_v2(conn)?;
        current_version = 2;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(
            conn,
            2,
            "Add correlation snapshots, effectiveness analyses and learning profiles",
            Some(
                r#"
                DROP TABLE IF EXISTS family_learning_patterns;
                DROP TABLE IF EXISTS effectiveness_analyses;
                DROP TABLE IF EXISTS correlation_snapshots;
                "#,
            ),
        )?;
    }

    if current_version < 3 {
        info!(target: "app::db", version = current_version, "running migration v3");
        migrate_to_v3(conn)?;
        current_version = 3;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(
            conn,
            3,
            "Add app settings and community contributions",
            Some(
                r#"
                DROP TABLE IF EXISTS community_contributions;
                DROP TABLE IF EXISTS app_settings;
                "#,
            ),
        )?;
    }

    if current_version != USER_VERSION {
        warn!(
            target: "app::db",
            found = current_version,
            expected = USER_VERSION,
            "unexpected schema version after migrations"
        );
    }

    Ok(())
}

fn record_migration(
    conn: &Connection,
    version: i32,
    description: &str,
    rollback_sql: Option<&str>,
) -> AppResult<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR REPLACE INTO migration_history (version, description, applied_at, rollback_sql) VALUES (?, ?, ?, ?)",
        (version, description, now, rollback_sql),
    )?;
    Ok(())
}

pub fn get_migration_history(conn: &Connection) -> AppResult<Vec<MigrationInfo>> {
    let mut stmt = conn.prepare(
        "SELECT version, description, applied_at FROM migration_history ORDER BY version",
    )?;

    let migrations = stmt
        .query_map([], |row| {
            let applied_at_str: String = row.get(2)?;
            let applied_at = DateTime::parse_from_rfc3339(&applied_at_str)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        2,
                        "applied_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Utc);

            Ok(MigrationInfo {
                version: row.get(0)?,
                description: row.get(1)?,
                applied_at,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(migrations)
}

fn migrate_to_v1(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chore_instances (
            id TEXT PRIMARY KEY,
            family_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            category TEXT,
            completed_by TEXT,
            assigned_to TEXT,
            completed_at TEXT NOT NULL,
            frequency TEXT,
            priority TEXT,
            task_weight REAL
        );
        CREATE INDEX IF NOT EXISTS idx_chore_instances_family_completed
            ON chore_instances(family_id, completed_at);

        CREATE TABLE IF NOT EXISTS kanban_tasks (
            id TEXT PRIMARY KEY,
            family_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            category TEXT,
            completed_by TEXT,
            assigned_to TEXT,
            completed_at TEXT NOT NULL,
            frequency TEXT,
            priority TEXT,
            task_weight REAL
        );
        CREATE INDEX IF NOT EXISTS idx_kanban_tasks_family_completed
            ON kanban_tasks(family_id, completed_at);

        CREATE TABLE IF NOT EXISTS achievements (
            id TEXT PRIMARY KEY,
            family_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            category TEXT,
            completed_by TEXT,
            assigned_to TEXT,
            completed_at TEXT NOT NULL,
            frequency TEXT,
            priority TEXT,
            task_weight REAL
        );
        CREATE INDEX IF NOT EXISTS idx_achievements_family_completed
            ON achievements(family_id, completed_at);

        CREATE TABLE IF NOT EXISTS survey_responses (
            id TEXT PRIMARY KEY,
            family_id TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            responses TEXT NOT NULL,
            question_metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_survey_responses_family_completed
            ON survey_responses(family_id, completed_at);

        CREATE TABLE IF NOT EXISTS question_feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            family_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            question_text TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            feedback_type TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_question_feedback_family
            ON question_feedback(family_id);
        CREATE INDEX IF NOT EXISTS idx_question_feedback_question
            ON question_feedback(question_id);
        "#,
    )?;

    Ok(())
}

fn migrate_to_v2(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS correlation_snapshots (
            id TEXT PRIMARY KEY,
            family_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            overall_accuracy REAL NOT NULL,
            payload TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_correlation_snapshots_family_created
            ON correlation_snapshots(family_id, created_at);

        CREATE TABLE IF NOT EXISTS effectiveness_analyses (
            family_id TEXT NOT NULL,
            survey_id TEXT NOT NULL,
            analysis_date TEXT NOT NULL,
            payload TEXT NOT NULL,
            PRIMARY KEY (family_id, survey_id)
        );
        CREATE INDEX IF NOT EXISTS idx_effectiveness_analyses_family_date
            ON effectiveness_analyses(family_id, analysis_date);

        CREATE TABLE IF NOT EXISTS family_learning_patterns (
            family_id TEXT PRIMARY KEY,
            profile TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    Ok(())
}

fn migrate_to_v3(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS community_contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            anonymous_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            contributed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_community_contributions_anonymous
            ON community_contributions(anonymous_id);
        "#,
    )?;

    Ok(())
}
