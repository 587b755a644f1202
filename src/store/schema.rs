//! Relation layout
//!
//! Tables are only ever created, never altered. Every statement is
//! `IF NOT EXISTS`, so running this on an existing database is a no-op.

use rusqlite::Connection;
use tracing::info;

use crate::error::{FatalError, StoreResult};

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS config (
        key   TEXT NOT NULL,
        value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS captures (
        filename  TEXT NOT NULL,
        success   INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        url       TEXT,
        file_path TEXT
    )",
    "CREATE INDEX IF NOT EXISTS captures_timestamp_idx ON captures(timestamp)",
    // Upload tokens, owned by the uploader's auth flow.
    "CREATE TABLE IF NOT EXISTS tokens (
        token    TEXT NOT NULL,
        expires  INTEGER NOT NULL,
        uploader TEXT NOT NULL
    )",
];

pub struct SchemaManager;

impl SchemaManager {
    /// Create any missing relations. A failing statement is fatal: nothing
    /// else in the store works without its tables.
    pub fn initialize(conn: &Connection) -> StoreResult<()> {
        for &statement in STATEMENTS {
            conn.execute_batch(statement)
                .map_err(|source| FatalError::Schema { statement, source })?;
        }
        info!(statements = STATEMENTS.len(), "Store schema initialised");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_initialize_creates_all_relations() {
        let conn = Connection::open_in_memory().unwrap();
        SchemaManager::initialize(&conn).unwrap();

        assert_eq!(table_names(&conn), vec!["captures", "config", "tokens"]);

        let index: String = conn
            .query_row(
                "SELECT tbl_name FROM sqlite_master \
                 WHERE type = 'index' AND name = 'captures_timestamp_idx'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index, "captures");
    }

    #[test]
    fn test_initialize_is_idempotent_and_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        SchemaManager::initialize(&conn).unwrap();
        conn.execute("INSERT INTO config VALUES ('a', '1')", []).unwrap();

        SchemaManager::initialize(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM config", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_initialize_fails_on_read_only_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE seed (x INTEGER)")
            .unwrap();

        let conn = Connection::open_with_flags(&path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
            .unwrap();
        let err = SchemaManager::initialize(&conn).unwrap_err();
        assert!(err.to_string().contains("unrecoverable"));
    }
}
