use chrono::{DateTime, Utc};
use tracing::instrument;

use vigil_core::history::{HistoryEntry, HistoryKind, HISTORY_CAPACITY};
use vigil_core::ids::{BotId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Durable mirror of each bot's connection history ring.
pub struct HistoryRepo {
    db: Database,
}

impl HistoryRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append an event and trim the bot's history to the retention cap.
    #[instrument(skip(self, entry), fields(bot_id = %bot_id, kind = %entry.kind))]
    pub fn append(&self, bot_id: &BotId, entry: &HistoryEntry) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO connection_history (bot_id, kind, message, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    bot_id.as_str(),
                    entry.kind.to_string(),
                    entry.message,
                    entry.timestamp.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;
        self.trim(bot_id, HISTORY_CAPACITY)
    }

    /// Delete everything but a bot's newest `keep` entries.
    #[instrument(skip(self), fields(bot_id = %bot_id))]
    pub fn trim(&self, bot_id: &BotId, keep: usize) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM connection_history
                 WHERE bot_id = ?1 AND id NOT IN (
                    SELECT id FROM connection_history
                    WHERE bot_id = ?1 ORDER BY id DESC LIMIT ?2
                 )",
                rusqlite::params![bot_id.as_str(), keep],
            )?;
            Ok(())
        })
    }

    /// List a bot's history newest-first, owner-checked through the bots table.
    #[instrument(skip(self), fields(bot_id = %bot_id, user_id = %user_id))]
    pub fn list(
        &self,
        bot_id: &BotId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT h.kind, h.message, h.timestamp
                 FROM connection_history h
                 JOIN bots b ON b.id = h.bot_id
                 WHERE h.bot_id = ?1 AND b.user_id = ?2
                 ORDER BY h.id DESC LIMIT ?3",
            )?;
            let mut rows =
                stmt.query(rusqlite::params![bot_id.as_str(), user_id.as_str(), limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_entry(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<HistoryEntry, StoreError> {
    let kind_str: String = row_helpers::get(row, 0, "connection_history", "kind")?;
    let ts_str: String = row_helpers::get(row, 2, "connection_history", "timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&ts_str)
        .map_err(|e| StoreError::CorruptRow {
            table: "connection_history",
            column: "timestamp",
            detail: e.to_string(),
        })?
        .with_timezone(&Utc);

    Ok(HistoryEntry {
        timestamp,
        kind: row_helpers::parse_enum::<HistoryKind>(&kind_str, "connection_history", "kind")?,
        message: row_helpers::get(row, 1, "connection_history", "message")?,
    })
}
