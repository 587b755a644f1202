//! Store error types
//!
//! Every failure inside the store is unrecoverable: once a statement fails or
//! a persisted value cannot be decoded, neither the durability of the config
//! nor the integrity of the capture history can be promised any more. Core
//! operations therefore return [`StoreError::Fatal`], and the process entry
//! point is expected to terminate when it sees one.

use std::path::PathBuf;

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store can no longer honor its guarantees; terminate the process.
    #[error("unrecoverable store failure: {0}")]
    Fatal(#[from] FatalError),
}

/// Cause of an unrecoverable store failure.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to open database at {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to prepare data directory {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema statement failed: {statement}")]
    Schema {
        statement: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database operation failed: {operation}")]
    Database {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("persisted value for config key '{key}' is not valid JSON")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("config value for key '{key}' could not be encoded")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Attach the failing operation to a database result, turning it fatal.
pub(crate) trait FatalContext<T> {
    fn fatal(self, operation: &'static str) -> StoreResult<T>;
}

impl<T> FatalContext<T> for Result<T, rusqlite::Error> {
    fn fatal(self, operation: &'static str) -> StoreResult<T> {
        self.map_err(|source| FatalError::Database { operation, source }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_context_names_operation() {
        let result: Result<(), rusqlite::Error> = Err(rusqlite::Error::QueryReturnedNoRows);
        let err = result.fatal("select config rows").unwrap_err();

        let StoreError::Fatal(FatalError::Database { operation, .. }) = &err else {
            panic!("expected database failure, got {err:?}");
        };
        assert_eq!(*operation, "select config rows");
        assert!(err.to_string().contains("unrecoverable"));
    }

    #[test]
    fn test_decode_error_mentions_key() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = StoreError::from(FatalError::Decode {
            key: "open_login".to_string(),
            source,
        });

        let StoreError::Fatal(fatal) = &err;
        assert!(fatal.to_string().contains("open_login"));
    }
}
