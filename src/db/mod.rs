//! SQLite storage layer for the schedule engine.
//!
//! `ScheduleDb` wraps a single connection in WAL mode with the schema
//! managed by `crate::migrations`. Entity operations live in the
//! submodules (`shifts`, `periods`, `roster`, `notifications`) as `impl`
//! blocks on `ScheduleDb`. The engine treats this layer as the
//! transactional store: filtered reads, inserts, updates, deletes, and a
//! distinguishable unique-constraint error.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod types;
pub use types::*;

mod notifications;
mod periods;
mod roster;
mod shifts;

pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Open (or create) a database at `path` and apply the schema.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Open an in-memory database with the full schema. Used by tests and
    /// ephemeral sessions.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}
