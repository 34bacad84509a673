//! SQLite database wrapper
//!
//! One connection behind a mutex; the schema is applied on open so the
//! item store and reaction log can share a file.

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::Path;

use crate::error::{RecError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    id            INTEGER PRIMARY KEY,
    author_id     TEXT NOT NULL,
    text          TEXT NOT NULL,
    embedding     BLOB NOT NULL,
    created_at    TEXT NOT NULL,
    approve_count INTEGER NOT NULL DEFAULT 0,
    reject_count  INTEGER NOT NULL DEFAULT 0,
    comment_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at);
CREATE INDEX IF NOT EXISTS idx_items_author_id ON items(author_id);

CREATE TABLE IF NOT EXISTS reactions (
    id          INTEGER PRIMARY KEY,
    target_kind TEXT NOT NULL,
    target_id   INTEGER NOT NULL,
    author_id   TEXT NOT NULL,
    kind        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reactions_author_id ON reactions(author_id);
CREATE INDEX IF NOT EXISTS idx_reactions_target_id ON reactions(target_id);
";

/// SQLite database holding items and reactions
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a SQLite database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            RecError::Storage(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::init(conn)
    }

    /// Create an in-memory database for testing
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection for one statement or transaction
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// True when the error is a uniqueness / primary key violation
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_applied() -> Result<()> {
        let db = Database::open_in_memory()?;
        let conn = db.connection();
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('items', 'reactions')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(tables, 2);
        Ok(())
    }

    #[test]
    fn test_reopen_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir().map_err(|e| RecError::Storage(e.to_string()))?;
        let path = dir.path().join("affinity.db");
        drop(Database::open(&path)?);
        let db = Database::open(&path)?;
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        assert_eq!(count, 0);
        Ok(())
    }

    #[test]
    fn test_duplicate_key_detected() -> Result<()> {
        let db = Database::open_in_memory()?;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO reactions (id, target_kind, target_id, author_id, kind, created_at)
             VALUES (1, 'ITEM', 1, 'a', 'APPROVE', '2025-01-01T00:00:00Z')",
            [],
        )?;
        let err = conn
            .execute(
                "INSERT INTO reactions (id, target_kind, target_id, author_id, kind, created_at)
                 VALUES (1, 'ITEM', 2, 'b', 'REJECT', '2025-01-01T00:00:00Z')",
                [],
            )
            .unwrap_err();
        assert!(is_constraint_violation(&err));
        Ok(())
    }
}
