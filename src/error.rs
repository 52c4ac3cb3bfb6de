/**
 * Error taxonomy for the organization engine
 */

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrganizeError>;

#[derive(Debug, Error)]
pub enum OrganizeError {
    /// Bad input or output directory. Fatal, raised before any file is touched.
    #[error("precondition failed for {}: {reason}", path.display())]
    Precondition { path: PathBuf, reason: String },

    /// The file is not a readable image of a supported container format.
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// Resize, re-encode or metadata write failed. The original is left untouched.
    #[error("failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    /// Disambiguation produced a name the filesystem cannot hold.
    #[error("conflict resolution exhausted for {}", path.display())]
    ConflictExhausted { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OrganizeError {
    pub fn precondition(path: &Path, reason: impl Into<String>) -> Self {
        Self::Precondition { path: path.to_path_buf(), reason: reason.into() }
    }

    pub fn decode(path: &Path, reason: impl ToString) -> Self {
        Self::Decode { path: path.to_path_buf(), reason: reason.to_string() }
    }

    pub fn encode(path: &Path, reason: impl ToString) -> Self {
        Self::Encode { path: path.to_path_buf(), reason: reason.to_string() }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }

    /// Only directory preconditions abort a run; everything else is per-file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }
}
