//! Error types for library operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::AssetId;

/// Errors surfaced by the media library.
///
/// Every variant is cheap to clone so an export job can keep the first
/// error it sees and still hand it to the completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("Media source unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Failed to enumerate assets: {0}")]
    EnumerationFailed(String),

    #[error("Failed to write resource to {path}: {reason}")]
    ResourceWriteFailed { path: PathBuf, reason: String },

    #[error("Failed to create directory {path}: {reason}")]
    DirectoryCreateFailed { path: PathBuf, reason: String },

    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("Failed to delete assets: {0}")]
    DeleteFailed(String),
}

impl LibraryError {
    /// Stale identifiers are reported but callers usually treat them as a no-op
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AssetNotFound(_))
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ResourceWriteFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn create_dir_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DirectoryCreateFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for library operations
pub type Result<T, E = LibraryError> = std::result::Result<T, E>;
