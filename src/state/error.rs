//! Error types for the merge checkpoint store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening or writing the merge database.
#[derive(Error, Debug)]
pub enum StateError {
    /// The store was opened without a complete (source, destination) scope.
    #[error("Merge database scope is incomplete: {0}")]
    Configuration(String),

    /// Failed to read the database file.
    #[error("Failed to open merge database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The database file is not a valid merge document.
    #[error("Merge database at {path} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to write the database file.
    #[error("Failed to write merge database at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to encode the database document.
    #[error("Failed to encode merge database: {0}")]
    Encode(#[from] serde_json::Error),

    /// The in-process lock around the records was poisoned.
    #[error("Merge database lock poisoned: {0}")]
    Lock(String),
}
