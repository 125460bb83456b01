//! Opaque change fingerprints.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// An opaque token describing a file's state at one point in time.
///
/// Fingerprints are only ever compared for equality; their text is never
/// interpreted beyond that. Each constructor prefixes its value with a tag
/// naming the derivation method, so fingerprints produced by different
/// strategies never compare equal.
///
/// The textual form never contains whitespace, which keeps it safe to store
/// in the space-separated fingerprint record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Builds a fingerprint from file content: the XXH3-128 digest in hex.
    ///
    /// Equal content always yields equal fingerprints; a collision between
    /// different content is assumed never to happen.
    pub fn from_content(content: &[u8]) -> Self {
        let digest = xxhash_rust::xxh3::xxh3_128(content);
        Self(format!("xxh3:{digest:032x}"))
    }

    /// Builds a fingerprint from a modification time.
    ///
    /// Times before the Unix epoch collapse to zero.
    pub fn from_mtime(modified: SystemTime) -> Self {
        let since = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(format!("mtime:{}.{:09}", since.as_secs(), since.subsec_nanos()))
    }

    /// Parses a fingerprint previously written with [`Fingerprint::as_str`].
    ///
    /// Returns `None` for empty text or text containing whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() || text.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(text.to_string()))
    }

    /// Returns the textual form of this fingerprint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
