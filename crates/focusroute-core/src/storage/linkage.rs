//! SQLite-backed linkage store.
//!
//! Provides persistent storage for:
//! - Mappings from an originating item (a mail thread) to the to-do and the
//!   calendar event generated for it
//! - Per-provider sync cursors

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::DatabaseError;

/// Stored linkage for one origin id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub origin_id: String,
    pub notion_block_id: Option<String>,
    pub calendar_event_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Records which to-do and calendar event were generated for an origin id.
pub trait LinkageRecorder {
    /// Insert the row if absent, otherwise overwrite only the supplied fields.
    fn upsert_mapping(
        &self,
        origin_id: &str,
        notion_block_id: Option<&str>,
        calendar_event_id: Option<&str>,
    ) -> Result<(), DatabaseError>;
}

/// SQLite database for linkage rows and sync cursors.
///
/// The connection sits behind a mutex so concurrent runs serialize their
/// writes.
pub struct LinkageStore {
    conn: Mutex<Connection>,
}

impl LinkageStore {
    /// Open the store at `~/.config/focusroute/focusroute.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        Self::open_in(data_dir())
    }

    fn open_in(dir: std::io::Result<PathBuf>) -> Result<Self, DatabaseError> {
        let dir = dir.map_err(|source| DatabaseError::DataDirUnavailable { source })?;
        Self::open_at(&dir.join("focusroute.db"))
    }

    /// Open (or create) the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (tests and offline runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.lock()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS mappings (
                thread_id         TEXT PRIMARY KEY,
                notion_block_id   TEXT,
                calendar_event_id TEXT,
                updated_at        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cursors (
                provider   TEXT PRIMARY KEY,
                cursor     TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Fetch the mapping for an origin id, if any.
    pub fn get_mapping(&self, origin_id: &str) -> Result<Option<Mapping>, DatabaseError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT thread_id, notion_block_id, calendar_event_id, updated_at
                 FROM mappings WHERE thread_id = ?1",
                params![origin_id],
                row_to_mapping,
            )
            .optional()?;
        Ok(row)
    }

    /// All mappings, most recently updated first.
    pub fn list_mappings(&self) -> Result<Vec<Mapping>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT thread_id, notion_block_id, calendar_event_id, updated_at
             FROM mappings ORDER BY updated_at DESC, thread_id",
        )?;
        let rows = stmt.query_map([], row_to_mapping)?;
        let mut mappings = Vec::new();
        for row in rows {
            mappings.push(row?);
        }
        Ok(mappings)
    }

    /// Last sync cursor stored for a provider.
    pub fn get_cursor(&self, provider: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.lock()?;
        let cursor = conn
            .query_row(
                "SELECT cursor FROM cursors WHERE provider = ?1",
                params![provider],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(cursor)
    }

    /// Replace the sync cursor for a provider.
    pub fn set_cursor(&self, provider: &str, cursor: &str) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cursors (provider, cursor, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(provider) DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at",
            params![provider, cursor, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl LinkageRecorder for LinkageStore {
    fn upsert_mapping(
        &self,
        origin_id: &str,
        notion_block_id: Option<&str>,
        calendar_event_id: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO mappings (thread_id, notion_block_id, calendar_event_id, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(thread_id) DO UPDATE SET
                notion_block_id = COALESCE(excluded.notion_block_id, mappings.notion_block_id),
                calendar_event_id = COALESCE(excluded.calendar_event_id, mappings.calendar_event_id),
                updated_at = excluded.updated_at",
            params![
                origin_id,
                notion_block_id,
                calendar_event_id,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

fn row_to_mapping(row: &rusqlite::Row) -> Result<Mapping, rusqlite::Error> {
    let updated_at: String = row.get(3)?;
    Ok(Mapping {
        origin_id: row.get(0)?,
        notion_block_id: row.get(1)?,
        calendar_event_id: row.get(2)?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_inserts_then_merges_fields() {
        let store = LinkageStore::open_memory().unwrap();
        store.upsert_mapping("t1", Some("block-a"), None).unwrap();
        store.upsert_mapping("t1", None, Some("event-b")).unwrap();

        let mapping = store.get_mapping("t1").unwrap().unwrap();
        assert_eq!(mapping.notion_block_id.as_deref(), Some("block-a"));
        assert_eq!(mapping.calendar_event_id.as_deref(), Some("event-b"));
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = LinkageStore::open_memory().unwrap();
        store.upsert_mapping("t1", Some("block-a"), Some("event-b")).unwrap();
        store.upsert_mapping("t1", Some("block-a"), Some("event-b")).unwrap();

        let mappings = store.list_mappings().unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].notion_block_id.as_deref(), Some("block-a"));
        assert_eq!(mappings[0].calendar_event_id.as_deref(), Some("event-b"));
    }

    #[test]
    fn bare_upsert_seeds_empty_row_without_clearing() {
        let store = LinkageStore::open_memory().unwrap();
        store.upsert_mapping("t1", None, None).unwrap();
        assert_eq!(
            store.get_mapping("t1").unwrap().unwrap().notion_block_id,
            None
        );

        store.upsert_mapping("t1", Some("block-a"), None).unwrap();
        store.upsert_mapping("t1", None, None).unwrap();
        assert_eq!(
            store.get_mapping("t1").unwrap().unwrap().notion_block_id.as_deref(),
            Some("block-a")
        );
    }

    #[test]
    fn supplied_fields_overwrite_previous_values() {
        let store = LinkageStore::open_memory().unwrap();
        store.upsert_mapping("t1", Some("old"), None).unwrap();
        store.upsert_mapping("t1", Some("new"), None).unwrap();
        assert_eq!(
            store.get_mapping("t1").unwrap().unwrap().notion_block_id.as_deref(),
            Some("new")
        );
    }

    #[test]
    fn missing_mapping_is_none() {
        let store = LinkageStore::open_memory().unwrap();
        assert!(store.get_mapping("nope").unwrap().is_none());
    }

    #[test]
    fn cursors_are_replaced() {
        let store = LinkageStore::open_memory().unwrap();
        assert_eq!(store.get_cursor("gmail").unwrap(), None);
        store.set_cursor("gmail", "100").unwrap();
        store.set_cursor("gmail", "200").unwrap();
        assert_eq!(store.get_cursor("gmail").unwrap().as_deref(), Some("200"));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.db");
        {
            let store = LinkageStore::open_at(&path).unwrap();
            store.upsert_mapping("t9", None, Some("evt-9")).unwrap();
        }
        let store = LinkageStore::open_at(&path).unwrap();
        assert_eq!(
            store.get_mapping("t9").unwrap().unwrap().calendar_event_id.as_deref(),
            Some("evt-9")
        );
    }

    #[test]
    fn missing_data_dir_is_reported_as_such() {
        let err = LinkageStore::open_in(Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only home",
        )))
        .err();
        assert!(matches!(err, Some(DatabaseError::DataDirUnavailable { .. })));
    }

    #[test]
    fn corrupt_timestamp_is_an_error() {
        let store = LinkageStore::open_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO mappings (thread_id, updated_at) VALUES ('t1', 'yesterday')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.get_mapping("t1"),
            Err(DatabaseError::QueryFailed(_))
        ));
        assert!(store.list_mappings().is_err());
    }
}
