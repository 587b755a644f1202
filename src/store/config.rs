//! In-memory settings backed by the `config` relation
//!
//! Reads and writes hit a `RwLock`ed map and never wait on disk. Nothing is
//! persisted until [`ConfigStore::flush`], which rewrites the whole relation
//! from a snapshot and then notifies the side-effect hooks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rusqlite::params;
use tracing::{debug, info, warn};

use crate::constants::keys;
use crate::error::{FatalContext, FatalError, StoreResult};
use crate::store::database::Database;
use crate::store::hooks::{PostLoadHook, StoreHooks};
use crate::store::value::ConfigValue;

pub struct ConfigStore {
    db: Arc<Database>,
    hooks: Arc<dyn StoreHooks>,
    items: RwLock<HashMap<String, ConfigValue>>,
    /// `open_login` as of the last load or flush
    login_start_last: AtomicBool,
    /// Held from the login diff until `set_login_item` returns, so hook calls
    /// land in flush order
    login_dispatch: Mutex<()>,
    /// `None` once the first load succeeded
    post_load: Mutex<Option<Vec<PostLoadHook>>>,
}

impl ConfigStore {
    pub(crate) fn new(db: Arc<Database>, hooks: Arc<dyn StoreHooks>) -> Self {
        Self {
            db,
            hooks,
            items: RwLock::new(HashMap::new()),
            login_start_last: AtomicBool::new(false),
            login_dispatch: Mutex::new(()),
            post_load: Mutex::new(Some(Vec::new())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ConfigValue>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ConfigValue>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a callback for right after the first successful [`load`](Self::load).
    /// Callbacks run in registration order. Registering after that load has no effect.
    pub fn on_post_load(&self, hook: impl FnOnce() + Send + 'static) {
        match self
            .post_load
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(queue) => queue.push(Box::new(hook)),
            None => warn!("Post-load hook registered after the first load, ignoring"),
        }
    }

    /// Read every persisted setting into memory.
    ///
    /// A row that is not valid JSON is fatal: everything downstream trusts
    /// the decoded shape.
    pub fn load(&self) -> StoreResult<()> {
        let rows = {
            let conn = self.db.lock();
            let mut stmt = conn
                .prepare("SELECT key, value FROM config")
                .fatal("prepare config select")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .fatal("query config rows")?;
            rows.collect::<Result<Vec<_>, _>>().fatal("read config row")?
        };

        let mut decoded = Vec::with_capacity(rows.len());
        for (key, text) in rows {
            let value = ConfigValue::from_json(&text).map_err(|source| FatalError::Decode {
                key: key.clone(),
                source,
            })?;
            decoded.push((key, value));
        }

        let count = decoded.len();
        let open_login = {
            let mut items = self.write();
            items.extend(decoded);
            open_login_of(&items)
        };
        self.login_start_last.store(open_login, Ordering::SeqCst);
        info!(entries = count, open_login, "Loaded config from store");

        let hooks = self
            .post_load
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();
        if !hooks.is_empty() {
            debug!(count = hooks.len(), "Running post-load hooks");
        }
        for hook in hooks {
            hook();
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.read().get(key).and_then(ConfigValue::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.read().get(key).and_then(ConfigValue::as_str).map(str::to_string)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.read().get(key).and_then(ConfigValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.read().get(key).and_then(ConfigValue::as_i64)
    }

    /// Update a setting in memory only. Call [`flush`](Self::flush) to persist.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        let key = key.into();
        let value = value.into();
        debug!(key = %key, value = %value, "Config value set");
        self.write().insert(key, value);
    }

    /// Drop a setting from memory; the row disappears at the next flush.
    pub fn remove(&self, key: &str) -> Option<ConfigValue> {
        self.write().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Point-in-time copy of every setting.
    pub fn snapshot(&self) -> HashMap<String, ConfigValue> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Persist the whole map and fire the dependent side effects.
    ///
    /// The relation is emptied and refilled from one snapshot inside a single
    /// transaction, so rows never duplicate and a crash leaves either the old
    /// or the new set. Concurrent `set` calls may or may not make it into the
    /// snapshot.
    pub fn flush(&self) -> StoreResult<()> {
        let (count, login_change) = {
            let mut conn = self.db.lock();
            let snapshot = self.snapshot();

            let mut encoded = Vec::with_capacity(snapshot.len());
            for (key, value) in &snapshot {
                let text = value.to_json().map_err(|source| FatalError::Encode {
                    key: key.clone(),
                    source,
                })?;
                encoded.push((key.as_str(), text));
            }

            let tx = conn.transaction().fatal("begin config flush")?;
            tx.execute("DELETE FROM config", []).fatal("delete config rows")?;
            {
                let mut insert = tx
                    .prepare("INSERT INTO config (key, value) VALUES (?1, ?2)")
                    .fatal("prepare config insert")?;
                for (key, text) in &encoded {
                    insert
                        .execute(params![key, text])
                        .fatal("insert config row")?;
                }
            }
            tx.commit().fatal("commit config flush")?;

            let open_login = open_login_of(&snapshot);
            let previous = self.login_start_last.swap(open_login, Ordering::SeqCst);
            // Taken before the store lock drops: the next flush cannot dispatch
            // its own login change until this one has.
            let login_change = (previous != open_login).then(|| {
                let dispatch = self
                    .login_dispatch
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                (open_login, dispatch)
            });
            (encoded.len(), login_change)
        };
        info!(entries = count, "Flushed config to store");

        if let Some((enabled, _dispatch)) = login_change {
            debug!(enabled, "open_login changed, updating login item");
            self.hooks.set_login_item(enabled);
        }
        self.hooks.restart_tray_process(false);
        self.hooks.reload_hotkeys();
        Ok(())
    }
}

/// Absent or non-boolean counts as disabled.
fn open_login_of(items: &HashMap<String, ConfigValue>) -> bool {
    items
        .get(keys::OPEN_LOGIN)
        .and_then(ConfigValue::as_bool)
        .unwrap_or(false)
}
