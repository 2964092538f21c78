use rusqlite::{named_params, Connection, OptionalExtension};

use crate::db::to_db_timestamp;
use crate::error::AppResult;
use crate::models::effectiveness::StoredEffectivenessAnalysis;

pub struct EffectivenessRepository;

impl EffectivenessRepository {
    /// One row per family and survey; re-running an analysis replaces it.
    pub fn upsert(conn: &Connection, analysis: &StoredEffectivenessAnalysis) -> AppResult<()> {
        let payload = serde_json::to_string(analysis)?;
        conn.execute(
            r#"
                INSERT INTO effectiveness_analyses (family_id, survey_id, analysis_date, payload)
                VALUES (:family_id, :survey_id, :analysis_date, :payload)
                ON CONFLICT(family_id, survey_id) DO UPDATE SET
                    analysis_date = excluded.analysis_date,
                    payload = excluded.payload
            "#,
            named_params! {
                ":family_id": &analysis.family_id,
                ":survey_id": &analysis.survey_id,
                ":analysis_date": to_db_timestamp(&analysis.analysis_date),
                ":payload": payload,
            },
        )?;
        Ok(())
    }

    pub fn find(
        conn: &Connection,
        family_id: &str,
        survey_id: &str,
    ) -> AppResult<Option<StoredEffectivenessAnalysis>> {
        let payload = conn
            .query_row(
                "SELECT payload FROM effectiveness_analyses WHERE family_id = ?1 AND survey_id = ?2",
                [family_id, survey_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Most recent analyses first.
    pub fn list_recent(
        conn: &Connection,
        family_id: &str,
        limit: usize,
    ) -> AppResult<Vec<StoredEffectivenessAnalysis>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT payload
                FROM effectiveness_analyses
                WHERE family_id = :family_id
                ORDER BY analysis_date DESC, survey_id DESC
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
