use rusqlite::{named_params, Connection};

use crate::db::to_db_timestamp;
use crate::error::AppResult;
use crate::models::correlation::CorrelationSnapshot;

pub struct CorrelationRepository;

impl CorrelationRepository {
    /// Snapshots are append-only; each run gets its own row.
    pub fn insert(conn: &Connection, snapshot: &CorrelationSnapshot) -> AppResult<()> {
        let payload = serde_json::to_string(snapshot)?;
        conn.execute(
            r#"
                INSERT INTO correlation_snapshots (id, family_id, created_at, overall_accuracy, payload)
                VALUES (:id, :family_id, :created_at, :overall_accuracy, :payload)
            "#,
            named_params! {
                ":id": &snapshot.id,
                ":family_id": &snapshot.family_id,
                ":created_at": to_db_timestamp(&snapshot.timestamp),
                ":overall_accuracy": snapshot.accuracy.overall,
                ":payload": payload,
            },
        )?;
        Ok(())
    }

    /// Most recent snapshots first.
    pub fn list_recent(
        conn: &Connection,
        family_id: &str,
        limit: usize,
    ) -> AppResult<Vec<CorrelationSnapshot>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT payload
                FROM correlation_snapshots
                WHERE family_id = :family_id
                ORDER BY created_at DESC, rowid DESC
                LIMIT :limit
            "#,
        )?;

        let payloads = stmt
            .query_map(
                named_params! {":family_id": family_id, ":limit": limit as i64},
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(Into::into))
            .collect()
    }
}
