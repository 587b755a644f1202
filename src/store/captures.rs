//! Capture history
//!
//! One row per capture attempt, successful or not. Rows are never updated;
//! history is only appended, listed, deleted by timestamp or purged. Nothing
//! is cached in memory, `list` always reads the relation.

use std::sync::Arc;

use rusqlite::{Connection, params};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::{FatalContext, StoreResult};
use crate::store::changes::ChangeNotifier;
use crate::store::database::Database;

/// One logged capture attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub filename: String,
    /// Only a literal JSON `true` counts as success when importing.
    #[serde(default, deserialize_with = "strictly_true")]
    pub success: bool,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl CaptureRecord {
    pub fn new(filename: impl Into<String>, success: bool, timestamp: i64) -> Self {
        Self {
            filename: filename.into(),
            success,
            timestamp,
            url: None,
            file_path: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

fn strictly_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value == serde_json::Value::Bool(true))
}

const INSERT_CAPTURE: &str = "INSERT INTO captures (filename, success, timestamp, url, file_path) \
     VALUES (?1, ?2, ?3, ?4, ?5)";

fn insert(conn: &Connection, record: &CaptureRecord) -> rusqlite::Result<usize> {
    conn.prepare_cached(INSERT_CAPTURE)?.execute(params![
        record.filename,
        record.success as i64,
        record.timestamp,
        record.url,
        record.file_path,
    ])
}

pub struct CaptureLog {
    db: Arc<Database>,
    changes: Arc<ChangeNotifier>,
}

impl CaptureLog {
    pub(crate) fn new(db: Arc<Database>, changes: Arc<ChangeNotifier>) -> Self {
        Self { db, changes }
    }

    /// Insert one record. Leaves the change marker alone; pollers only
    /// watch for bulk changes.
    pub fn append(&self, record: &CaptureRecord) -> StoreResult<()> {
        let conn = self.db.lock();
        insert(&conn, record).fatal("insert capture")?;
        debug!(
            filename = %record.filename,
            success = record.success,
            timestamp = record.timestamp,
            "Capture logged"
        );
        Ok(())
    }

    /// Log a capture that just finished, stamped with the current time.
    pub fn log_capture(
        &self,
        filename: impl Into<String>,
        url: Option<String>,
        file_path: Option<String>,
        success: bool,
    ) -> StoreResult<CaptureRecord> {
        let record = CaptureRecord {
            filename: filename.into(),
            success,
            timestamp: chrono::Utc::now().timestamp_millis(),
            url,
            file_path,
        };
        self.append(&record)?;
        Ok(record)
    }

    /// Insert a batch in one critical section and one transaction, then move
    /// the change marker once.
    pub fn bulk_append(&self, records: &[CaptureRecord]) -> StoreResult<()> {
        let mut conn = self.db.lock();
        let tx = conn.transaction().fatal("begin capture import")?;
        for record in records {
            insert(&tx, record).fatal("insert imported capture")?;
        }
        tx.commit().fatal("commit capture import")?;
        let marker = self.changes.mark();
        info!(count = records.len(), marker, "Imported captures");
        Ok(())
    }

    /// Remove every record with exactly this timestamp. Returns how many went.
    pub fn delete(&self, timestamp: i64) -> StoreResult<usize> {
        let conn = self.db.lock();
        let removed = conn
            .execute("DELETE FROM captures WHERE timestamp = ?1", params![timestamp])
            .fatal("delete capture")?;
        debug!(timestamp, removed, "Deleted captures");
        Ok(removed)
    }

    /// Remove the whole history and move the change marker.
    pub fn purge(&self) -> StoreResult<usize> {
        let conn = self.db.lock();
        let removed = conn
            .execute("DELETE FROM captures", [])
            .fatal("purge captures")?;
        let marker = self.changes.mark();
        info!(removed, marker, "Purged capture history");
        Ok(removed)
    }

    /// Every record, newest first.
    pub fn list(&self) -> StoreResult<Vec<CaptureRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT filename, success, timestamp, url, file_path FROM captures \
                 ORDER BY timestamp DESC",
            )
            .fatal("prepare capture select")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CaptureRecord {
                    filename: row.get(0)?,
                    success: row.get::<_, i64>(1)? == 1,
                    timestamp: row.get(2)?,
                    url: row.get(3)?,
                    file_path: row.get(4)?,
                })
            })
            .fatal("query captures")?;
        let records = rows.collect::<Result<Vec<_>, _>>().fatal("read capture row")?;
        Ok(records)
    }

    /// Marker shared with pollers; see [`ChangeNotifier`].
    pub fn changes(&self) -> &ChangeNotifier {
        &self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::SchemaManager;

    fn log() -> CaptureLog {
        let db = Arc::new(Database::open_in_memory().unwrap());
        SchemaManager::initialize(&db.lock()).unwrap();
        CaptureLog::new(db, Arc::new(ChangeNotifier::new()))
    }

    #[test]
    fn test_append_then_list_single_record() {
        let log = log();
        log.append(&CaptureRecord::new("a.png", true, 1000)).unwrap();

        assert_eq!(log.list().unwrap(), vec![CaptureRecord::new("a.png", true, 1000)]);
    }

    #[test]
    fn test_append_keeps_optional_fields() {
        let log = log();
        let record = CaptureRecord::new("b.png", true, 5)
            .with_url("https://i.example/b.png")
            .with_file_path("/home/me/Pictures/b.png");
        log.append(&record).unwrap();

        assert_eq!(log.list().unwrap(), vec![record]);
    }

    #[test]
    fn test_append_does_not_move_marker() {
        let log = log();
        log.append(&CaptureRecord::new("a.png", true, 1)).unwrap();
        assert_eq!(log.changes().current(), None);

        log.purge().unwrap();
        let after_purge = log.changes().current();
        log.log_capture("c.png", None, None, false).unwrap();
        assert_eq!(log.changes().current(), after_purge);
        assert_eq!(log.list().unwrap().len(), 1);
    }

    #[test]
    fn test_bulk_append_lists_newest_first() {
        let log = log();
        log.bulk_append(&[
            CaptureRecord::new("b.png", false, 2000),
            CaptureRecord::new("c.png", true, 1000),
        ])
        .unwrap();

        let listed = log.list().unwrap();
        assert_eq!(
            listed,
            vec![
                CaptureRecord::new("b.png", false, 2000),
                CaptureRecord::new("c.png", true, 1000),
            ]
        );
        assert!(log.changes().current().is_some());
    }

    #[test]
    fn test_bulk_append_many_sorted_descending() {
        let log = log();
        let records: Vec<_> = [7, 3, 9, 1, 5]
            .iter()
            .map(|ts| CaptureRecord::new(format!("{ts}.png"), true, *ts))
            .collect();
        log.bulk_append(&records).unwrap();

        let timestamps: Vec<i64> = log.list().unwrap().iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![9, 7, 5, 3, 1]);
    }

    #[test]
    fn test_empty_bulk_append_still_marks() {
        let log = log();
        log.bulk_append(&[]).unwrap();
        assert!(log.changes().current().is_some());
    }

    #[test]
    fn test_purge_empties_and_advances_marker() {
        let log = log();
        log.bulk_append(&[CaptureRecord::new("a.png", true, 1)]).unwrap();
        let before = log.changes().current().unwrap();

        assert_eq!(log.purge().unwrap(), 1);
        assert!(log.list().unwrap().is_empty());
        assert!(log.changes().current().unwrap() > before);
    }

    #[test]
    fn test_delete_removes_all_and_only_matching() {
        let log = log();
        log.bulk_append(&[
            CaptureRecord::new("a.png", true, 10),
            CaptureRecord::new("b.png", false, 20),
            CaptureRecord::new("c.png", true, 20),
            CaptureRecord::new("d.png", true, 30),
        ])
        .unwrap();
        let marker = log.changes().current();

        assert_eq!(log.delete(20).unwrap(), 2);
        assert_eq!(log.delete(99).unwrap(), 0);

        let names: Vec<String> = log.list().unwrap().into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["d.png", "a.png"]);
        assert_eq!(log.changes().current(), marker);
    }

    #[test]
    fn test_import_success_must_be_literal_true() {
        let records: Vec<CaptureRecord> = serde_json::from_str(
            r#"[
                {"filename": "a.png", "success": true, "timestamp": 3},
                {"filename": "b.png", "success": "true", "timestamp": 2},
                {"filename": "c.png", "success": 1, "timestamp": 1, "url": "https://x"},
                {"filename": "d.png", "timestamp": 0, "file_path": null}
            ]"#,
        )
        .unwrap();

        let flags: Vec<bool> = records.iter().map(|r| r.success).collect();
        assert_eq!(flags, vec![true, false, false, false]);
        assert_eq!(records[2].url.as_deref(), Some("https://x"));

        let log = log();
        log.bulk_append(&records).unwrap();
        let stored: Vec<bool> = log.list().unwrap().iter().map(|r| r.success).collect();
        assert_eq!(stored, vec![true, false, false, false]);
    }

    #[test]
    fn test_serialized_record_uses_snake_case_fields() {
        let record = CaptureRecord::new("a.png", true, 1).with_file_path("/a");
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["file_path"], "/a");
        assert_eq!(json["url"], serde_json::Value::Null);
    }
}
