use std::collections::BTreeMap;
use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::db::{parse_db_timestamp, to_db_timestamp};
use crate::error::AppResult;
use crate::models::survey::{QuestionMetadata, SurveyRecord};

#[derive(Debug, Clone)]
pub struct SurveyRow {
    pub id: String,
    pub family_id: String,
    pub completed_at: String,
    pub responses: String,
    pub question_metadata: String,
}

impl SurveyRow {
    pub fn from_record(record: &SurveyRecord) -> AppResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            family_id: record.family_id.clone(),
            completed_at: to_db_timestamp(&record.completed_at),
            responses: serde_json::to_string(&record.responses)?,
            question_metadata: serde_json::to_string(&record.question_metadata)?,
        })
    }

    pub fn into_record(self) -> AppResult<SurveyRecord> {
        Ok(SurveyRecord {
            completed_at: parse_db_timestamp(&self.completed_at, 2)?,
            responses: serde_json::from_str(&self.responses)?,
            question_metadata: serde_json::from_str(&self.question_metadata)?,
            id: self.id,
            family_id: self.family_id,
        })
    }
}

impl TryFrom<&Row<'_>> for SurveyRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            family_id: row.get("family_id")?,
            completed_at: row.get("completed_at")?,
            responses: row.get("responses")?,
            question_metadata: row.get("question_metadata")?,
        })
    }
}

pub struct SurveyRepository;

impl SurveyRepository {
    pub fn insert(conn: &Connection, record: &SurveyRecord) -> AppResult<()> {
        let row = SurveyRow::from_record(record)?;
        conn.execute(
            r#"
                INSERT INTO survey_responses (id, family_id, completed_at, responses, question_metadata)
                VALUES (:id, :family_id, :completed_at, :responses, :question_metadata)
            "#,
            named_params! {
                ":id": &row.id,
                ":family_id": &row.family_id,
                ":completed_at": &row.completed_at,
                ":responses": &row.responses,
                ":question_metadata": &row.question_metadata,
            },
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<SurveyRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, family_id, completed_at, responses, question_metadata
                FROM survey_responses
                WHERE id = :id
            "#,
        )?;

        let row = stmt
            .query_row(named_params! {":id": id}, |row| SurveyRow::try_from(row))
            .optional()?;

        row.map(SurveyRow::into_record).transpose()
    }

    /// Most recent surveys first.
    pub fn list_recent(conn: &Connection, family_id: &str, limit: usize) -> AppResult<Vec<SurveyRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, family_id, completed_at, responses, question_metadata
                FROM survey_responses
                WHERE family_id = :family_id
                ORDER BY completed_at DESC, id DESC
                LIMIT :limit
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {":family_id": family_id, ":limit": limit as i64},
                |row| SurveyRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(SurveyRow::into_record).collect()
    }

    /// Latest stored metadata for a question across the family's surveys.
    pub fn find_question_metadata(
        conn: &Connection,
        family_id: &str,
        question_id: &str,
    ) -> AppResult<Option<QuestionMetadata>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT question_metadata
                FROM survey_responses
                WHERE family_id = :family_id
                ORDER BY completed_at DESC
            "#,
        )?;

        let payloads = stmt
            .query_map(named_params! {":family_id": family_id}, |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for payload in payloads {
            let mut metadata: BTreeMap<String, QuestionMetadata> = serde_json::from_str(&payload)?;
            if let Some(found) = metadata.remove(question_id) {
                if found.category.is_some() {
                    return Ok(Some(found));
                }
            }
        }

        Ok(None)
    }
}
