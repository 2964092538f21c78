use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::db::to_db_timestamp;
use crate::error::AppResult;
use crate::models::learning::FamilyLearningProfile;

pub struct LearningPatternRepository;

impl LearningPatternRepository {
    pub fn find(conn: &Connection, family_id: &str) -> AppResult<Option<FamilyLearningProfile>> {
        let payload = conn
            .query_row(
                "SELECT profile FROM family_learning_patterns WHERE family_id = ?1",
                [family_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Read-merge-write under an immediate transaction.
    pub fn merge(
        conn: &Connection,
        family_id: &str,
        update: &FamilyLearningProfile,
    ) -> AppResult<FamilyLearningProfile> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        let mut profile = Self::find(&tx, family_id)?
            .unwrap_or_else(|| FamilyLearningProfile::new(family_id));
        profile.merge(update);
        let now = Utc::now();
        profile.updated_at = Some(now);

        let payload = serde_json::to_string(&profile)?;
        tx.execute(
            r#"
                INSERT INTO family_learning_patterns (family_id, profile, updated_at)
                VALUES (:family_id, :profile, :updated_at)
                ON CONFLICT(family_id) DO UPDATE SET
                    profile = excluded.profile,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":family_id": family_id,
                ":profile": payload,
                ":updated_at": to_db_timestamp(&now),
            },
        )?;
        tx.commit()?;

        Ok(profile)
    }
}
