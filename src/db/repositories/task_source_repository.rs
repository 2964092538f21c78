use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, Row};

use crate::db::{parse_db_timestamp, to_db_timestamp};
use crate::error::AppResult;
use crate::models::household::TaskSourceType;
use crate::models::task::RawTaskEvent;

const COLUMNS: &str = "id, family_id, title, description, category, completed_by, assigned_to, \
                       completed_at, frequency, priority, task_weight";

/// Table backing each task event source.
pub fn table_for(source: TaskSourceType) -> &'static str {
    match source {
        TaskSourceType::Chore => "chore_instances",
        TaskSourceType::Kanban => "kanban_tasks",
        TaskSourceType::Achievement => "achievements",
    }
}

#[derive(Debug, Clone)]
pub struct TaskEventRow {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub completed_by: Option<String>,
    pub assigned_to: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub frequency: Option<String>,
    pub priority: Option<String>,
    pub task_weight: Option<f64>,
}

impl TaskEventRow {
    pub fn into_event(self) -> RawTaskEvent {
        RawTaskEvent {
            id: self.id,
            family_id: self.family_id,
            title: self.title,
            description: self.description,
            category: self.category,
            completed_by: self.completed_by,
            assigned_to: self.assigned_to,
            completed_at: self.completed_at,
            frequency: self.frequency,
            priority: self.priority,
            task_weight: self.task_weight,
        }
    }
}

impl TryFrom<&Row<'_>> for TaskEventRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        let completed_at: String = row.get("completed_at")?;
        Ok(Self {
            id: row.get("id")?,
            family_id: row.get("family_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            category: row.get("category")?,
            completed_by: row.get("completed_by")?,
            assigned_to: row.get("assigned_to")?,
            completed_at: parse_db_timestamp(&completed_at, 7)?,
            frequency: row.get("frequency")?,
            priority: row.get("priority")?,
            task_weight: row.get("task_weight")?,
        })
    }
}

pub struct TaskSourceRepository;

impl TaskSourceRepository {
    pub fn insert(conn: &Connection, source: TaskSourceType, event: &RawTaskEvent) -> AppResult<()> {
        let sql = format!(
            "INSERT INTO {table} ({COLUMNS}) VALUES (:id, :family_id, :title, :description, \
             :category, :completed_by, :assigned_to, :completed_at, :frequency, :priority, \
             :task_weight)",
            table = table_for(source),
        );

        conn.execute(
            &sql,
            named_params! {
                ":id": &event.id,
                ":family_id": &event.family_id,
                ":title": &event.title,
                ":description": &event.description,
                ":category": &event.category,
                ":completed_by": &event.completed_by,
                ":assigned_to": &event.assigned_to,
                ":completed_at": to_db_timestamp(&event.completed_at),
                ":frequency": &event.frequency,
                ":priority": &event.priority,
                ":task_weight": &event.task_weight,
            },
        )?;

        Ok(())
    }

    /// Completions of one family inside `[start, end]`, oldest first.
    pub fn list_completed(
        conn: &Connection,
        source: TaskSourceType,
        family_id: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> AppResult<Vec<RawTaskEvent>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {table} \
             WHERE family_id = :family_id AND completed_at >= :start AND completed_at <= :end \
             ORDER BY completed_at ASC, id ASC",
            table = table_for(source),
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                named_params! {
                    ":family_id": family_id,
                    ":start": to_db_timestamp(start),
                    ":end": to_db_timestamp(end),
                },
                |row| TaskEventRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().map(TaskEventRow::into_event).collect())
    }
}
