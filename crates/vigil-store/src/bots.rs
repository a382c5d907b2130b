use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use vigil_core::ids::{BotId, UserId};
use vigil_core::status::{BotStatus, StatusCounts};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Durable record of a managed bot. Holds only the masked preview and the
/// one-way verification hash — never the plaintext token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotRow {
    pub id: BotId,
    pub user_id: UserId,
    pub token_preview: String,
    pub status: BotStatus,
    pub last_error: Option<String>,
    pub created_at: String,
}

pub struct BotRepo {
    db: Database,
}

impl BotRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new bot record with status 'connecting'.
    #[instrument(skip(self, token_hash), fields(user_id = %user_id))]
    pub fn create(
        &self,
        user_id: &UserId,
        token_preview: &str,
        token_hash: &str,
    ) -> Result<BotRow, StoreError> {
        let id = BotId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bots (id, user_id, token_preview, token_hash, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'connecting', ?5)",
                rusqlite::params![id.as_str(), user_id.as_str(), token_preview, token_hash, now],
            )?;

            Ok(BotRow {
                id,
                user_id: user_id.clone(),
                token_preview: token_preview.to_string(),
                status: BotStatus::Connecting,
                last_error: None,
                created_at: now,
            })
        })
    }

    /// Get a bot by (id, owner). Owner mismatch reads as not found.
    #[instrument(skip(self), fields(bot_id = %id, user_id = %user_id))]
    pub fn get(&self, id: &BotId, user_id: &UserId) -> Result<Option<BotRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, token_preview, status, last_error, created_at
                 FROM bots WHERE id = ?1 AND user_id = ?2",
            )?;
            let mut rows = stmt.query([id.as_str(), user_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_bot(row)?)),
                None => Ok(None),
            }
        })
    }

    /// List a user's bots, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn list_by_user(&self, user_id: &UserId) -> Result<Vec<BotRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, token_preview, status, last_error, created_at
                 FROM bots WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let mut rows = stmt.query([user_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_bot(row)?);
            }
            Ok(results)
        })
    }

    /// Update status and last_error, owner-checked. Returns affected rows.
    #[instrument(skip(self), fields(bot_id = %id, user_id = %user_id, status = %status))]
    pub fn update_status(
        &self,
        id: &BotId,
        user_id: &UserId,
        status: BotStatus,
        last_error: Option<&str>,
    ) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE bots SET status = ?1, last_error = ?2 WHERE id = ?3 AND user_id = ?4",
                rusqlite::params![status.to_string(), last_error, id.as_str(), user_id.as_str()],
            )?;
            Ok(affected)
        })
    }

    /// Delete a bot and (via cascade) its history. Returns affected rows.
    #[instrument(skip(self), fields(bot_id = %id, user_id = %user_id))]
    pub fn delete(&self, id: &BotId, user_id: &UserId) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM bots WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id.as_str(), user_id.as_str()],
            )?;
            Ok(affected)
        })
    }

    /// Aggregate status counts for one user. Every key present even if zero.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn status_counts(&self, user_id: &UserId) -> Result<StatusCounts, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'online' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'offline' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'connecting' THEN 1 ELSE 0 END), 0)
                 FROM bots WHERE user_id = ?1",
                [user_id.as_str()],
                |row| {
                    Ok(StatusCounts {
                        total: row.get(0)?,
                        online: row.get(1)?,
                        offline: row.get(2)?,
                        connecting: row.get(3)?,
                    })
                },
            )
            .map_err(StoreError::from)
        })
    }
    /// Aggregate status counts across every user, for the health endpoint.
    #[instrument(skip(self))]
    pub fn global_status_counts(&self) -> Result<StatusCounts, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'online' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'offline' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'connecting' THEN 1 ELSE 0 END), 0)
                 FROM bots",
                [],
                |row| {
                    Ok(StatusCounts {
                        total: row.get(0)?,
                        online: row.get(1)?,
                        offline: row.get(2)?,
                        connecting: row.get(3)?,
                    })
                },
            )
            .map_err(StoreError::from)
        })
    }
}

fn row_to_bot(row: &rusqlite::Row<'_>) -> Result<BotRow, StoreError> {
    let status_str: String = row_helpers::get(row, 3, "bots", "status")?;

    Ok(BotRow {
        id: BotId::from_raw(row_helpers::get::<String>(row, 0, "bots", "id")?),
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "bots", "user_id")?),
        token_preview: row_helpers::get(row, 2, "bots", "token_preview")?,
        status: row_helpers::parse_enum(&status_str, "bots", "status")?,
        last_error: row_helpers::get_opt(row, 4, "bots", "last_error")?,
        created_at: row_helpers::get(row, 5, "bots", "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserRepo;

    fn setup() -> (Database, UserId) {
        let db = Database::in_memory().unwrap();
        let user = UserRepo::new(db.clone()).get_or_create("sess-test").unwrap();
        (db, user.id)
    }

    #[test]
    fn create_bot() {
        let (db, user_id) = setup();
        let repo = BotRepo::new(db);
        let bot = repo.create(&user_id, "****abcd", "deadbeef").unwrap();
        assert!(bot.id.as_str().starts_with("bot_"));
        assert_eq!(bot.status, BotStatus::Connecting);
        assert!(bot.last_error.is_none());
    }

    #[test]
    fn get_bot_by_owner() {
        let (db, user_id) = setup();
        let repo = BotRepo::new(db);
        let bot = repo.create(&user_id, "****abcd", "deadbeef").unwrap();
        let fetched = repo.get(&bot.id, &user_id).unwrap().unwrap();
        assert_eq!(fetched.id, bot.id);
        assert_eq!(fetched.token_preview, "****abcd");
    }

    #[test]
    fn owner_mismatch_reads_as_absent() {
        let (db, user_id) = setup();
        let other = UserRepo::new(db.clone()).get_or_create("sess-other").unwrap();
        let repo = BotRepo::new(db);
        let bot = repo.create(&user_id, "****abcd", "deadbeef").unwrap();

        assert!(repo.get(&bot.id, &other.id).unwrap().is_none());
        assert_eq!(repo.delete(&bot.id, &other.id).unwrap(), 0);
        assert_eq!(
            repo.update_status(&bot.id, &other.id, BotStatus::Online, None).unwrap(),
            0
        );
        // The record is untouched for its real owner
        let fetched = repo.get(&bot.id, &user_id).unwrap().unwrap();
        assert_eq!(fetched.status, BotStatus::Connecting);
    }

    #[test]
    fn list_newest_first() {
        let (db, user_id) = setup();
        let repo = BotRepo::new(db);
        let first = repo.create(&user_id, "****aaaa", "h1").unwrap();
        let second = repo.create(&user_id, "****bbbb", "h2").unwrap();

        let all = repo.list_by_user(&user_id).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[test]
    fn list_scoped_to_owner() {
        let (db, user_id) = setup();
        let other = UserRepo::new(db.clone()).get_or_create("sess-other").unwrap();
        let repo = BotRepo::new(db);
        repo.create(&user_id, "****aaaa", "h1").unwrap();
        repo.create(&other.id, "****bbbb", "h2").unwrap();

        assert_eq!(repo.list_by_user(&user_id).unwrap().len(), 1);
        assert_eq!(repo.list_by_user(&other.id).unwrap().len(), 1);
    }

    #[test]
    fn update_status_and_error() {
        let (db, user_id) = setup();
        let repo = BotRepo::new(db);
        let bot = repo.create(&user_id, "****abcd", "h").unwrap();

        let affected = repo
            .update_status(&bot.id, &user_id, BotStatus::Offline, Some("boom"))
            .unwrap();
        assert_eq!(affected, 1);

        let fetched = repo.get(&bot.id, &user_id).unwrap().unwrap();
        assert_eq!(fetched.status, BotStatus::Offline);
        assert_eq!(fetched.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn delete_bot() {
        let (db, user_id) = setup();
        let repo = BotRepo::new(db);
        let bot = repo.create(&user_id, "****abcd", "h").unwrap();
        assert_eq!(repo.delete(&bot.id, &user_id).unwrap(), 1);
        assert!(repo.get(&bot.id, &user_id).unwrap().is_none());
        // Second delete affects nothing
        assert_eq!(repo.delete(&bot.id, &user_id).unwrap(), 0);
    }

    #[test]
    fn status_counts_all_keys() {
        let (db, user_id) = setup();
        let repo = BotRepo::new(db);

        let counts = repo.status_counts(&user_id).unwrap();
        assert_eq!(counts, StatusCounts::default());

        let a = repo.create(&user_id, "****aaaa", "h1").unwrap();
        let b = repo.create(&user_id, "****bbbb", "h2").unwrap();
        repo.create(&user_id, "****cccc", "h3").unwrap();
        repo.update_status(&a.id, &user_id, BotStatus::Online, None).unwrap();
        repo.update_status(&b.id, &user_id, BotStatus::Offline, None).unwrap();

        let counts = repo.status_counts(&user_id).unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.online, 1);
        assert_eq!(counts.offline, 1);
        assert_eq!(counts.connecting, 1);
    }

    #[test]
    fn counts_scoped_to_owner() {
        let (db, user_id) = setup();
        let other = UserRepo::new(db.clone()).get_or_create("sess-other").unwrap();
        let repo = BotRepo::new(db);
        repo.create(&user_id, "****aaaa", "h1").unwrap();

        assert_eq!(repo.status_counts(&other.id).unwrap().total, 0);
    }

    #[test]
    fn global_counts_span_users() {
        let (db, user_id) = setup();
        let other = UserRepo::new(db.clone()).get_or_create("sess-other").unwrap();
        let repo = BotRepo::new(db);
        repo.create(&user_id, "****aaaa", "h1").unwrap();
        repo.create(&other.id, "****bbbb", "h2").unwrap();

        let counts = repo.global_status_counts().unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.connecting, 2);
    }

    #[test]
    fn invalid_status_returns_corrupt_row() {
        let (db, user_id) = setup();
        let bot_id = BotId::new();
        let now = Utc::now().to_rfc3339();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bots (id, user_id, token_preview, token_hash, status, created_at)
                 VALUES (?1, ?2, '****x', 'h', 'BROKEN', ?3)",
                rusqlite::params![bot_id.as_str(), user_id.as_str(), now],
            )?;
            Ok(())
        })
        .unwrap();

        let repo = BotRepo::new(db);
        let result = repo.get(&bot_id, &user_id);
        assert!(matches!(result, Err(StoreError::CorruptRow { .. })));
    }
}
