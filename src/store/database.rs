//! SQLite connection guarded by the store lock
//!
//! Every statement goes through [`Database::lock`], so flushes and capture
//! mutations never interleave and a reader never sees a half-finished rewrite.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{FatalError, StoreResult};

pub(crate) struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database file, creating its directory if needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| FatalError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| FatalError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        // WAL keeps readers from other processes (backup tools, the tray)
        // off the writer's back.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|source| FatalError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "Opened capture store database");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, gone when dropped.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| FatalError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        debug!("Opened in-memory capture store database");
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Take the store lock.
    ///
    /// A panic while holding the lock cannot leave SQLite half-written (each
    /// mutation runs in its own transaction), so a poisoned lock is reused.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
