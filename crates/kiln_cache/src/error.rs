//! Error types for build state operations.

use std::path::PathBuf;

/// Errors that can occur while reading sources or persisting build state.
///
/// Loading state is fail-safe and never produces these: a missing or corrupt
/// record simply starts empty. They surface from fingerprint derivation and
/// from flushing records back to disk.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading a source or writing a record.
    #[error("build state I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = CacheError::io(
            "/tmp/proj/.kiln/fingerprints",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        );
        let msg = err.to_string();
        assert!(msg.contains("build state I/O error"));
        assert!(msg.contains("fingerprints"));
        assert!(msg.contains("read-only"));
    }
}
