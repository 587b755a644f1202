//! Data directory resolution

use std::path::{Path, PathBuf};

use crate::constants::paths;

/// Where the database and its backups live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve in order: explicit override, `$CAPTURE_STORE_DATA_DIR`, the
    /// platform config dir, and finally the working directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let root = explicit
            .or_else(|| std::env::var_os(paths::DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| {
                let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
                path.push(paths::APP_DIR);
                path
            });
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(paths::DB_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_wins() {
        let dir = DataDir::resolve(Some(PathBuf::from("/tmp/explicit")));
        assert_eq!(dir.root(), Path::new("/tmp/explicit"));
        assert_eq!(dir.db_path(), Path::new("/tmp/explicit").join(paths::DB_FILENAME));
    }

    #[test]
    fn test_default_ends_with_app_dir() {
        if std::env::var_os(paths::DATA_DIR_ENV).is_some() {
            return;
        }
        let dir = DataDir::resolve(None);
        assert!(dir.root().ends_with(paths::APP_DIR));
    }
}
