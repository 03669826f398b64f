//! SQLite-backed decision store.
//!
//! The active decision lives in a single row of a key-value table, serialized
//! as JSON. Absence of the row means there is no active decision.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, DecisionStore};
use crate::decision::Decision;
use crate::error::PersistenceError;

const ACTIVE_DECISION_KEY: &str = "active_decision";
const DB_FILE: &str = "waitwise.db";

/// SQLite database holding the active decision.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data dir>/waitwise.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> Result<Self, PersistenceError> {
        let path = data_dir()?.join(DB_FILE);
        Self::open_at(&path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(|source| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a value from the kv store.
    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl DecisionStore for Database {
    fn save(&self, decision: &Decision) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(decision)?;
        self.kv_set(ACTIVE_DECISION_KEY, &json)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Decision>, PersistenceError> {
        match self.kv_get(ACTIVE_DECISION_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.kv_delete(ACTIVE_DECISION_KEY)?;
        Ok(())
    }
}
