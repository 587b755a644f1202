//! Application-wide constants
//!
//! Paths, backup naming and well-known configuration keys live here so the
//! store, the backup manager and the CLI agree on them.

/// On-disk layout
pub mod paths {
    /// Directory created under the platform config dir
    pub const APP_DIR: &str = "capture-store";

    /// SQLite database filename inside the data directory
    pub const DB_FILENAME: &str = "capture-store.db";

    /// Environment variable overriding the data directory
    pub const DATA_DIR_ENV: &str = "CAPTURE_STORE_DATA_DIR";
}

/// Backup archive settings
pub mod backup {
    /// Subdirectory of the data directory holding archives
    pub const SUBDIR: &str = "backups";

    /// Archive extension (tar + gzip)
    pub const EXTENSION: &str = "tar.gz";

    pub const MANUAL_PREFIX: &str = "manual_backup";
    pub const AUTO_PREFIX: &str = "auto_backup";

    /// Scratch file written by `VACUUM INTO` before archiving
    pub const STAGING_FILENAME: &str = ".staging.db";
}

/// Well-known configuration keys
pub mod keys {
    /// Launch the application at user login (boolean)
    pub const OPEN_LOGIN: &str = "open_login";

    /// Installation identifier assigned on first run (string)
    pub const INSTALL_ID: &str = "install_id";

    /// What to put on the clipboard after a capture (number)
    pub const CLIPBOARD_ACTION: &str = "clipboard_action";
}

/// Process exit codes used by the CLI
pub mod exit {
    /// A command failed in a recoverable way (bad input, missing backup)
    pub const FAILURE: i32 = 1;

    /// The store reported an unrecoverable failure
    pub const FATAL: i32 = 70;
}
