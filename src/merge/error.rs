use thiserror::Error;

use crate::library::LibraryError;
use crate::state::StateError;

/// Errors that stop a merge run.
///
/// Per-photo export and import failures never reach this type; they are
/// recorded in the checkpoint store and the run moves on.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Invalid invocation, detected before any photo is processed.
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("Failed to create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),
}
