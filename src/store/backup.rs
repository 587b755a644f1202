//! Store Backup Manager
//!
//! Handles creation, restoration, and management of database backups.
//! Backups are stored as .tar.gz archives in a 'backups' subdirectory of the
//! data directory, each holding a consistent copy of the database file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rusqlite::params;
use tracing::{debug, error, info, warn};

use crate::constants::{backup, paths};
use crate::store::Store;

/// Represents a backup file
#[derive(Debug, Clone)]
pub struct BackupEntry {
    pub filename: String,
    pub path: PathBuf,
    pub timestamp: SystemTime,
    pub is_manual: bool,
}

/// Backups for the database living in `data_dir`.
#[derive(Debug, Clone)]
pub struct BackupManager {
    data_dir: PathBuf,
}

impl BackupManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Get the path to the backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(backup::SUBDIR)
    }

    fn db_path(&self) -> PathBuf {
        self.data_dir.join(paths::DB_FILENAME)
    }

    /// Archive a consistent copy of the open store.
    ///
    /// The copy is taken with `VACUUM INTO` under the store lock, so no flush
    /// or capture write lands halfway through it.
    pub fn create_backup(&self, store: &Store, is_manual: bool) -> Result<PathBuf> {
        let backup_dir = self.backup_dir();
        if !backup_dir.exists() {
            fs::create_dir_all(&backup_dir).context("Failed to create backup directory")?;
        }

        // Generate filename: [auto|manual]_backup_YYYYMMDD_HHMMSS_mmm.tar.gz
        let datetime: chrono::DateTime<chrono::Local> = SystemTime::now().into();
        let timestamp_str = datetime.format("%Y%m%d_%H%M%S_%3f").to_string();
        let prefix = if is_manual {
            backup::MANUAL_PREFIX
        } else {
            backup::AUTO_PREFIX
        };
        let filename = format!("{}_{}.{}", prefix, timestamp_str, backup::EXTENSION);
        let backup_path = backup_dir.join(&filename);

        let staging = backup_dir.join(backup::STAGING_FILENAME);
        if staging.exists() {
            fs::remove_file(&staging).context("Failed to clear stale staging file")?;
        }
        let staging_str = staging
            .to_str()
            .context("Backup directory path is not valid UTF-8")?
            .to_string();
        store.with_connection("snapshot database for backup", |conn| {
            conn.execute("VACUUM INTO ?1", params![staging_str]).map(|_| ())
        })?;

        let archived = Self::write_archive(&backup_path, &staging);
        if let Err(e) = fs::remove_file(&staging) {
            warn!(
                path = %staging.display(),
                error = %e,
                "Failed to remove backup staging file"
            );
        }
        archived?;

        info!(path = %backup_path.display(), is_manual, "Created backup");
        Ok(backup_path)
    }

    fn write_archive(backup_path: &Path, snapshot: &Path) -> Result<()> {
        let tar_gz = fs::File::create(backup_path).context("Failed to create backup file")?;
        let enc = GzEncoder::new(tar_gz, Compression::default());
        let mut tar = tar::Builder::new(enc);

        let mut file = fs::File::open(snapshot).context("Failed to open database snapshot")?;
        tar.append_file(paths::DB_FILENAME, &mut file)
            .context("Failed to add database to archive")?;
        tar.into_inner()
            .context("Failed to finish backup archive")?
            .finish()
            .context("Failed to finish backup compression")?;
        Ok(())
    }

    /// Every archive in the backup directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        let backup_dir = self.backup_dir();
        if !backup_dir.exists() {
            return Ok(Vec::new());
        }

        let suffix = format!(".{}", backup::EXTENSION);
        let mut backups = fs::read_dir(&backup_dir)
            .with_context(|| format!("Failed to read {}", backup_dir.display()))?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let filename = entry.file_name().into_string().ok()?;
                if !filename.ends_with(&suffix) {
                    return None;
                }
                let timestamp = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                Some(BackupEntry {
                    is_manual: filename.starts_with(backup::MANUAL_PREFIX),
                    path: entry.path(),
                    filename,
                    timestamp,
                })
            })
            .collect::<Vec<_>>();

        // Names embed the creation time and break mtime ties
        backups.sort_by(|a, b| {
            (b.timestamp, creation_stamp(&b.filename))
                .cmp(&(a.timestamp, creation_stamp(&a.filename)))
        });
        Ok(backups)
    }

    /// Resolve `filename` inside the backup directory.
    ///
    /// Only bare file names are accepted; anything that could point outside
    /// the directory is rejected.
    fn archive_path(&self, filename: &str) -> Result<PathBuf> {
        let is_bare = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\']);
        if !is_bare {
            anyhow::bail!("Invalid backup name: {:?}", filename);
        }
        Ok(self.backup_dir().join(filename))
    }

    /// Replace the database file with the one stored in a backup.
    ///
    /// The store must not be open: SQLite would keep writing to the file it
    /// already holds.
    pub fn restore_backup(&self, filename: &str) -> Result<()> {
        let backup_path = self.archive_path(filename)?;
        if !backup_path.exists() {
            anyhow::bail!("Backup file not found: {}", filename);
        }

        let tar_gz = fs::File::open(&backup_path).context("Failed to open backup file")?;
        let mut archive = tar::Archive::new(GzDecoder::new(tar_gz));

        fs::create_dir_all(&self.data_dir).context("Failed to create data directory")?;

        // Stale WAL files belong to the database being replaced
        let db_path = self.db_path();
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = db_path.clone().into_os_string();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.exists() {
                fs::remove_file(&sidecar)
                    .with_context(|| format!("Failed to remove {}", sidecar.display()))?;
            }
        }

        archive
            .unpack(&self.data_dir)
            .context("Failed to unpack backup")?;

        info!(backup = %filename, "Restored backup");
        Ok(())
    }

    /// Remove one archive. A name that is already gone is not an error.
    pub fn delete_backup(&self, filename: &str) -> Result<()> {
        let backup_path = self.archive_path(filename)?;
        match fs::remove_file(&backup_path) {
            Ok(()) => {
                info!(backup = %filename, "Deleted backup");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to delete backup file: {}", filename))
            }
        }
    }

    /// Delete all but the newest `keep` automatic archives. Manual archives
    /// are never touched. Returns how many were removed.
    pub fn prune_backups(&self, keep: u32) -> Result<usize> {
        let stale = self
            .list_backups()?
            .into_iter()
            .filter(|b| !b.is_manual)
            .skip(keep as usize);

        let mut pruned = 0;
        for entry in stale {
            match fs::remove_file(&entry.path) {
                Ok(()) => {
                    info!(backup = %entry.filename, "Pruned old backup");
                    pruned += 1;
                }
                Err(e) => {
                    error!(path = %entry.path.display(), error = %e, "Failed to prune backup")
                }
            }
        }
        Ok(pruned)
    }

    /// Whether the newest automatic archive is at least `interval_days` old.
    /// An interval of zero disables automatic backups.
    pub fn should_run_auto_backup(&self, interval_days: u32) -> bool {
        if interval_days == 0 {
            return false;
        }
        let newest_auto = match self.list_backups() {
            Ok(list) => list.into_iter().find(|b| !b.is_manual),
            Err(e) => {
                warn!(error = %e, "Could not list backups, scheduling one");
                return true;
            }
        };
        let Some(entry) = newest_auto else {
            return true;
        };
        let interval = Duration::from_secs(u64::from(interval_days) * 86_400);
        // A timestamp in the future means the clock moved backwards
        SystemTime::now()
            .duration_since(entry.timestamp)
            .map_or(true, |age| age >= interval)
    }

    /// Create an automatic archive if one is due, then prune down to `keep`.
    /// Returns the new archive, if any.
    pub fn run_auto_backup(
        &self,
        store: &Store,
        interval_days: u32,
        keep: u32,
    ) -> Result<Option<PathBuf>> {
        if !self.should_run_auto_backup(interval_days) {
            debug!(interval_days, "Automatic backup not due");
            return Ok(None);
        }
        let path = self.create_backup(store, false)?;
        self.prune_backups(keep)?;
        Ok(Some(path))
    }
}

/// `YYYYMMDD_HHMMSS_mmm` part of a backup filename.
fn creation_stamp(filename: &str) -> &str {
    filename
        .trim_start_matches(backup::MANUAL_PREFIX)
        .trim_start_matches(backup::AUTO_PREFIX)
}
