//! SQLite-backed key-value store.
//!
//! Holds one JSON snapshot per user under `user:<id>`, plus an append-only
//! `claims` table mirroring every accepted reward claim for auditing.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use super::{data_dir, KvStore};
use crate::error::{CoreError, DatabaseError};
use crate::ledger::{ActivityKind, ClaimRecord};

/// SQLite database for user snapshots.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/focuspet/focuspet.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("focuspet.db");
        Ok(Self::open_at(&path)?)
    }

    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Locked)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS claims (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                activity    TEXT NOT NULL,
                lesson_id   INTEGER,
                amount      INTEGER NOT NULL,
                claimed_at  TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_claims_user ON claims(user_id, claimed_at);",
        )?;
        Ok(())
    }

    /// Append an accepted claim to the audit table.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_claim(&self, claim: &ClaimRecord) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        insert_claim(&conn, claim)?;
        Ok(conn.last_insert_rowid())
    }

    /// Total amount credited to `user` since `since`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn earned_since(&self, user: &str, since: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM claims
             WHERE user_id = ?1 AND claimed_at >= ?2",
            params![user, since.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        debug!(key, bytes = value.len(), "kv write");
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    fn commit(&self, key: &str, value: &str, claims: &[ClaimRecord]) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        for claim in claims {
            insert_claim(&tx, claim)?;
        }
        tx.commit()?;
        debug!(key, bytes = value.len(), claims = claims.len(), "kv commit");
        Ok(())
    }
}

fn insert_claim(conn: &Connection, claim: &ClaimRecord) -> rusqlite::Result<usize> {
    let (activity, lesson_id) = match claim.activity {
        ActivityKind::Lesson { lesson_id } => ("lesson", Some(lesson_id)),
        ActivityKind::FocusSession => ("focus_session", None),
    };
    conn.execute(
        "INSERT INTO claims (user_id, activity, lesson_id, amount, claimed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            claim.user.as_str(),
            activity,
            lesson_id,
            claim.amount as i64,
            claim.timestamp.to_rfc3339(),
        ],
    )
}
