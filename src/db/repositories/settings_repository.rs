use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row, Transaction, TransactionBehavior};

use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for SettingRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            key: row.get("key")?,
            value: row.get("value")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct SettingsRepository;

impl SettingsRepository {
    pub fn list(conn: &Connection) -> AppResult<Vec<SettingRow>> {
        let mut stmt =
            conn.prepare("SELECT key, value, updated_at FROM app_settings ORDER BY key ASC")?;

        let rows = stmt
            .query_map([], |row| SettingRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Writes all pairs atomically.
    pub fn upsert_all(conn: &Connection, entries: &[(&str, String)]) -> AppResult<()> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        for (key, value) in entries {
            tx.execute(
                r#"
                    INSERT INTO app_settings (key, value)
                    VALUES (:key, :value)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = CURRENT_TIMESTAMP
                "#,
                named_params! {":key": key, ":value": value},
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
