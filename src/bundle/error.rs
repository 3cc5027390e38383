//! Bundle error types

use std::io;
use thiserror::Error;

/// Fatal errors of a bundle operation.
///
/// Per-item problems during import never surface here; they are collected
/// as messages in [`ImportResult::errors`](super::import::ImportResult).
#[derive(Debug, Error)]
pub enum BundleError {
    /// Manifest missing, malformed, or otherwise invalid
    #[error("Invalid bundle: {0}")]
    Validation(String),

    /// Manifest names a format other than `lens-bundle`
    #[error("Unsupported bundle format: '{found}'")]
    UnsupportedFormat { found: String },

    /// Manifest version not understood by this importer
    #[error("Unsupported bundle version: '{version}'")]
    UnsupportedVersion { version: String },

    /// Required entry missing from the archive
    #[error("Missing entry in bundle: {0}")]
    MissingEntry(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Corrupt or unreadable compressed container
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl BundleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_entry(name: impl Into<String>) -> Self {
        Self::MissingEntry(name.into())
    }
}

/// Result type for bundle operations
pub type BundleResult<T> = Result<T, BundleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BundleError::UnsupportedFormat {
            found: "zip-thing".to_string(),
        };
        assert!(err.to_string().contains("zip-thing"));

        let err = BundleError::UnsupportedVersion {
            version: "9.0".to_string(),
        };
        assert!(err.to_string().contains("9.0"));

        let err = BundleError::missing_entry("manifest.json");
        assert!(err.to_string().contains("manifest.json"));
    }

    #[test]
    fn test_conversions() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: BundleError = io_err.into();
        assert!(matches!(err, BundleError::Io(_)));

        let err: BundleError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, BundleError::Store(_)));
        assert_eq!(err.to_string(), "disk full");
    }
}
