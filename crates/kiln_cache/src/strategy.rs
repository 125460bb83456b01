//! Pluggable fingerprint derivation.

use std::path::Path;

use kiln_common::Fingerprint;

use crate::error::CacheError;

/// Derives a [`Fingerprint`] for a file on disk.
///
/// Implementations must be deterministic: an untouched file yields an equal
/// fingerprint every time it is asked.
pub trait FingerprintStrategy {
    /// Computes the current fingerprint of the file at `path`.
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, CacheError>;
}

/// Fingerprints a file by hashing its full content with XXH3-128.
///
/// Exact: equal content always gives equal fingerprints, at the cost of
/// reading every file once per run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentStrategy;

impl FingerprintStrategy for ContentStrategy {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
        Ok(Fingerprint::from_content(&content))
    }
}

/// Fingerprints a file by its modification time.
///
/// Only touches metadata. Misses edits that preserve the timestamp and
/// rebuilds files that were touched without being changed.
#[derive(Debug, Default, Clone, Copy)]
pub struct MtimeStrategy;

impl FingerprintStrategy for MtimeStrategy {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, CacheError> {
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| CacheError::io(path, e))?;
        Ok(Fingerprint::from_mtime(modified))
    }
}
