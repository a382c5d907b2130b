use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use vigil_core::ids::UserId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A dashboard user, identified by an opaque browser session id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRow {
    pub id: UserId,
    pub session_id: String,
    pub created_at: String,
    pub last_active: String,
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the user for a session id, creating one if none exists.
    #[instrument(skip(self))]
    pub fn get_or_create(&self, session_id: &str) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT id, session_id, created_at, last_active FROM users WHERE session_id = ?1",
                    [session_id],
                    row_to_user_sql,
                )
                .ok();

            if let Some(user) = existing {
                let now = Utc::now().to_rfc3339();
                conn.execute(
                    "UPDATE users SET last_active = ?1 WHERE id = ?2",
                    rusqlite::params![now, user.id.as_str()],
                )?;
                return Ok(user);
            }

            let id = UserId::new();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO users (id, session_id, created_at, last_active) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.as_str(), session_id, now, now],
            )?;

            Ok(UserRow {
                id,
                session_id: session_id.to_string(),
                created_at: now.clone(),
                last_active: now,
            })
        })
    }

    /// Get a user by id.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: &UserId) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, created_at, last_active FROM users WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {id}"))),
            }
        })
    }

    /// Look up a user by session id without creating one.
    #[instrument(skip(self))]
    pub fn get_by_session(&self, session_id: &str) -> Result<Option<UserRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, created_at, last_active FROM users WHERE session_id = ?1",
            )?;
            let mut rows = stmt.query([session_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_user(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Bump the last_active timestamp.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn touch(&self, id: &UserId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE users SET last_active = ?1 WHERE id = ?2",
                rusqlite::params![now, id.as_str()],
            )?;
            Ok(())
        })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRow, StoreError> {
    Ok(UserRow {
        id: UserId::from_raw(row_helpers::get::<String>(row, 0, "users", "id")?),
        session_id: row_helpers::get(row, 1, "users", "session_id")?,
        created_at: row_helpers::get(row, 2, "users", "created_at")?,
        last_active: row_helpers::get(row, 3, "users", "last_active")?,
    })
}

fn row_to_user_sql(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: UserId::from_raw(row.get::<_, String>(0)?),
        session_id: row.get(1)?,
        created_at: row.get(2)?,
        last_active: row.get(3)?,
    })
}
