//! Error types for the note workspace

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NoteError {
    /// The operation was rejected and nothing changed.
    #[error("{0}")]
    Refused(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item is not a folder: {0}")]
    NotAFolder(String),

    /// The filesystem mirror reported failure; in-memory state was left untouched.
    #[error("Filesystem {op} failed for {}", path.display())]
    Mirror { op: &'static str, path: PathBuf },

    #[error("No filesystem mirror is attached")]
    NoMirror,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NoteError {
    pub(crate) fn refused(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        log::warn!("refused: {}", reason);
        NoteError::Refused(reason)
    }

    pub(crate) fn mirror(op: &'static str, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        log::error!("filesystem {} failed for {}", op, path.display());
        NoteError::Mirror { op, path }
    }

    /// True for validation refusals, which leave state unchanged by construction.
    pub fn is_refusal(&self) -> bool {
        matches!(self, NoteError::Refused(_))
    }
}

pub type Result<T> = std::result::Result<T, NoteError>;
