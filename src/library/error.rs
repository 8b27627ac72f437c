use thiserror::Error;

/// Errors raised by the source and destination collaborators.
///
/// `is_photo_failure()` separates failures that only concern the photo being
/// merged (recorded in the checkpoint, run continues) from everything else
/// (missing tools, unexpected output), which aborts the run.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    Command {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Error exporting photo {uuid}: {reason}")]
    Export { uuid: String, reason: String },

    #[error("Error importing {files}: {reason}")]
    Import { files: String, reason: String },

    #[error("Unexpected output from {tool}: {reason}")]
    Parse { tool: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LibraryError {
    /// Whether this failure is confined to a single photo.
    pub fn is_photo_failure(&self) -> bool {
        match self {
            LibraryError::Export { .. } | LibraryError::Import { .. } => true,
            LibraryError::Spawn { .. }
            | LibraryError::Command { .. }
            | LibraryError::Parse { .. }
            | LibraryError::Io(_)
            | LibraryError::Json(_) => false,
        }
    }

    /// Whether retrying the same script may succeed. Only command failures
    /// qualify; a missing tool stays missing.
    pub fn is_transient(&self) -> bool {
        matches!(self, LibraryError::Command { .. })
    }
}
