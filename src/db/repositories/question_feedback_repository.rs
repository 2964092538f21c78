use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::db::{parse_db_timestamp, to_db_timestamp};
use crate::error::{AppError, AppResult};
use crate::models::survey::{FeedbackType, QuestionFeedback};

#[derive(Debug, Clone)]
pub struct QuestionFeedbackRow {
    pub family_id: String,
    pub question_id: String,
    pub question_text: String,
    pub category: String,
    pub feedback_type: String,
    pub created_at: String,
}

impl QuestionFeedbackRow {
    pub fn into_record(self) -> AppResult<QuestionFeedback> {
        let feedback_type =
            FeedbackType::try_from(self.feedback_type.as_str()).map_err(AppError::validation)?;
        Ok(QuestionFeedback {
            created_at: parse_db_timestamp(&self.created_at, 5)?,
            family_id: self.family_id,
            question_id: self.question_id,
            question_text: self.question_text,
            category: self.category,
            feedback_type,
        })
    }
}

impl TryFrom<&Row<'_>> for QuestionFeedbackRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            family_id: row.get("family_id")?,
            question_id: row.get("question_id")?,
            question_text: row.get("question_text")?,
            category: row.get("category")?,
            feedback_type: row.get("feedback_type")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct QuestionFeedbackRepository;

impl QuestionFeedbackRepository {
    pub fn insert(conn: &Connection, feedback: &QuestionFeedback) -> AppResult<i64> {
        conn.execute(
            r#"
                INSERT INTO question_feedback (
                    family_id, question_id, question_text, category, feedback_type, created_at
                ) VALUES (
                    :family_id, :question_id, :question_text, :category, :feedback_type, :created_at
                )
            "#,
            named_params! {
                ":family_id": &feedback.family_id,
                ":question_id": &feedback.question_id,
                ":question_text": &feedback.question_text,
                ":category": &feedback.category,
                ":feedback_type": feedback.feedback_type.as_str(),
                ":created_at": to_db_timestamp(&feedback.created_at),
            },
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_by_family(conn: &Connection, family_id: &str) -> AppResult<Vec<QuestionFeedback>> {
        Self::list_where(conn, "family_id = :value", family_id)
    }

    pub fn list_by_question(conn: &Connection, question_id: &str) -> AppResult<Vec<QuestionFeedback>> {
        Self::list_where(conn, "question_id = :value", question_id)
    }

    fn list_where(conn: &Connection, predicate: &str, value: &str) -> AppResult<Vec<QuestionFeedback>> {
        let sql = format!(
            "SELECT family_id, question_id, question_text, category, feedback_type, created_at \
             FROM question_feedback WHERE {predicate} ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(named_params! {":value": value}, |row| {
                QuestionFeedbackRow::try_from(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(QuestionFeedbackRow::into_record).collect()
    }
}
