//! Persistent store
//!
//! One [`Store`] is opened at startup and shared (behind an `Arc`) with every
//! subsystem that reads settings or logs captures. Two locks are involved:
//! the config map's `RwLock` for fast in-memory access, and the database
//! mutex that serializes every write to disk.

pub mod backup;
pub mod captures;
pub mod changes;
pub mod config;
mod database;
pub mod hooks;
pub mod schema;
pub mod value;

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;

use crate::error::{FatalContext, StoreResult};
use crate::store::database::Database;

pub use backup::{BackupEntry, BackupManager};
pub use captures::{CaptureLog, CaptureRecord};
pub use changes::ChangeNotifier;
pub use config::ConfigStore;
pub use hooks::{LoggingHooks, NoopHooks, PostLoadHook, StoreHooks};
pub use schema::SchemaManager;
pub use value::ConfigValue;

pub struct Store {
    db: Arc<Database>,
    config: ConfigStore,
    captures: CaptureLog,
}

impl Store {
    /// Open the database at `path` and make sure its schema exists.
    ///
    /// The config map is still empty afterwards: register any post-load
    /// hooks, then call [`ConfigStore::load`].
    pub fn open(path: impl AsRef<Path>, hooks: Arc<dyn StoreHooks>) -> StoreResult<Self> {
        Self::from_database(Database::open(path)?, hooks)
    }

    pub fn open_in_memory(hooks: Arc<dyn StoreHooks>) -> StoreResult<Self> {
        Self::from_database(Database::open_in_memory()?, hooks)
    }

    /// Open, initialise the schema and load the config in one go.
    pub fn open_and_load(path: impl AsRef<Path>, hooks: Arc<dyn StoreHooks>) -> StoreResult<Self> {
        let store = Self::open(path, hooks)?;
        store.config.load()?;
        Ok(store)
    }

    fn from_database(db: Database, hooks: Arc<dyn StoreHooks>) -> StoreResult<Self> {
        SchemaManager::initialize(&db.lock())?;

        let db = Arc::new(db);
        let changes = Arc::new(ChangeNotifier::new());
        Ok(Self {
            config: ConfigStore::new(db.clone(), hooks),
            captures: CaptureLog::new(db.clone(), changes),
            db,
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn captures(&self) -> &CaptureLog {
        &self.captures
    }

    pub fn changes(&self) -> &ChangeNotifier {
        self.captures.changes()
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db.path()
    }

    /// Run `f` against the connection while holding the store lock, so no
    /// flush or capture mutation runs concurrently.
    pub(crate) fn with_connection<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let conn = self.db.lock();
        f(&conn).fatal(operation)
    }
}
