//! SQLite database handle
//!
//! One connection shared by the feed registry and the item store. Uniqueness
//! of `feeds.feed_url` and `items.url_hash` is enforced by the schema, which is
//! what makes concurrent or overlapping ingestion runs safe.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use newslog_core::CoreError;

/// Shared SQLite connection
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and its tables
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Io(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        let database = Self::from_connection(conn)?;

        info!("Opened database at: {}", db_path.as_ref().display());
        Ok(database)
    }

    /// Create an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let database = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        database.init_schema()?;

        Ok(database)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL DEFAULT '',
                site_url TEXT NOT NULL DEFAULT '',
                feed_url TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1,
                last_checked_at INTEGER,
                http_etag TEXT,
                last_modified TEXT,
                fail_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_feeds_active
            ON feeds(active, title);

            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                url_hash TEXT NOT NULL UNIQUE,
                summary_raw TEXT,
                author TEXT,
                published_at INTEGER,
                source_name TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'new'
                    CHECK (status IN ('new', 'discarded', 'curated')),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_status_published
            ON items(status, published_at DESC);

            CREATE INDEX IF NOT EXISTS idx_items_feed
            ON items(feed_id, status);
            "#,
        )?;

        Ok(())
    }

    /// Acquire the connection
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockError)
    }

    /// Round-trip a trivial query
    pub fn ping(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

/// Unix seconds to UTC timestamp
pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

/// Whether an error is a UNIQUE/constraint violation
pub(crate) fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to acquire lock")]
    LockError,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Feed URL already registered: {0}")]
    DuplicateFeed(String),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let database = Database::open_in_memory().unwrap();
        database.init_schema().unwrap();
        database.ping().unwrap();
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let database = Database::open_in_memory().unwrap();
        let conn = database.lock().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
