use rusqlite::{named_params, Connection};

use crate::db::to_db_timestamp;
use crate::error::AppResult;
use crate::models::community::AnonymizedContribution;

pub struct CommunityContributionRepository;

impl CommunityContributionRepository {
    pub fn insert(conn: &Connection, contribution: &AnonymizedContribution) -> AppResult<i64> {
        conn.execute(
            r#"
                INSERT INTO community_contributions (anonymous_id, payload, contributed_at)
                VALUES (:anonymous_id, :payload, :contributed_at)
            "#,
            named_params! {
                ":anonymous_id": &contribution.anonymous_id,
                ":payload": serde_json::to_string(contribution)?,
                ":contributed_at": to_db_timestamp(&contribution.contributed_at),
            },
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count_for(conn: &Connection, anonymous_id: &str) -> AppResult<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM community_contributions WHERE anonymous_id = ?1",
            [anonymous_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
