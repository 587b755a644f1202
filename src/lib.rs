//! Configuration and capture-history store for a desktop capture utility
//!
//! Settings live in memory behind a read/write lock and are persisted to
//! SQLite only on an explicit flush, which also notifies the login-item,
//! hotkey and tray collaborators. Capture attempts are appended to a history
//! table that bulk imports and purges stamp with a change marker.

#![deny(unsafe_code)]

pub mod constants;
pub mod error;
pub mod paths;
pub mod store;

pub use error::{FatalError, StoreError, StoreResult};
pub use store::{
    BackupManager, CaptureLog, CaptureRecord, ChangeNotifier, ConfigStore, ConfigValue, Store,
    StoreHooks,
};
