//! Persistent per-file change fingerprints.
//!
//! The record is stored as `fingerprints` in the state directory, one
//! `<source path> <fingerprint>` line per file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use kiln_common::{Fingerprint, SourcePath};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::record;
use crate::strategy::FingerprintStrategy;

/// Name of the fingerprint record within the state directory.
pub const RECORD_FILE: &str = "fingerprints";

/// Tracks the last recorded fingerprint of every source file.
///
/// Comparisons happen against the state loaded at the start of the run.
/// Whenever a file is found changed its fresh fingerprint replaces the old one
/// in memory and the store becomes dirty; [`flush_if_dirty`](Self::flush_if_dirty)
/// writes the record back only in that case.
pub struct FingerprintStore {
    record_path: PathBuf,
    root: PathBuf,
    strategy: Box<dyn FingerprintStrategy>,
    entries: HashMap<SourcePath, Fingerprint>,
    dirty: bool,
}

impl FingerprintStore {
    /// Loads the fingerprint record from `state_dir`.
    ///
    /// Source paths are resolved against `root`. A missing or malformed
    /// record yields an empty store, so every file reads as changed.
    pub fn load(state_dir: &Path, root: &Path, strategy: Box<dyn FingerprintStrategy>) -> Self {
        let record_path = state_dir.join(RECORD_FILE);
        let entries = match record::read(&record_path) {
            Some(text) => parse_record(&text).unwrap_or_else(|| {
                debug!(path = %record_path.display(), "discarding malformed fingerprint record");
                HashMap::new()
            }),
            None => HashMap::new(),
        };
        debug!(entries = entries.len(), "loaded fingerprints");
        Self {
            record_path,
            root: root.to_path_buf(),
            strategy,
            entries,
            dirty: false,
        }
    }

    /// Returns `true` if `path` changed since its fingerprint was last recorded.
    ///
    /// A file without a recorded fingerprint counts as changed. On change the
    /// fresh fingerprint is recorded and the store is marked dirty. A file that
    /// cannot be fingerprinted (e.g. deleted) counts as changed and nothing is
    /// recorded for it.
    pub fn is_changed(&mut self, path: &SourcePath) -> bool {
        let fresh = match self.strategy.fingerprint(&path.to_fs_path(&self.root)) {
            Ok(fp) => fp,
            Err(e) => {
                warn!("cannot fingerprint {path}: {e}");
                return true;
            }
        };
        if self.entries.get(path) == Some(&fresh) {
            return false;
        }
        debug!(%path, fingerprint = %fresh, "fingerprint changed");
        self.entries.insert(path.clone(), fresh);
        self.dirty = true;
        true
    }

    /// Drops the recorded fingerprint for `path`, forcing it to read as
    /// changed on the next run.
    ///
    /// Used when the build command for `path` failed after its new
    /// fingerprint had already been recorded.
    pub fn forget(&mut self, path: &SourcePath) {
        if self.entries.remove(path).is_some() {
            self.dirty = true;
        }
    }

    /// Returns the recorded fingerprint for `path`, if any.
    pub fn get(&self, path: &SourcePath) -> Option<&Fingerprint> {
        self.entries.get(path)
    }

    /// Returns the number of recorded fingerprints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no fingerprints are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the in-memory state differs from the loaded record.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the record back if anything changed since it was loaded.
    ///
    /// Returns whether a write happened. On failure the store stays dirty
    /// and the error is returned for the caller to report.
    pub fn flush_if_dirty(&mut self) -> Result<bool, CacheError> {
        if !self.dirty {
            return Ok(false);
        }
        record::write(&self.record_path, &render_record(&self.entries))?;
        self.dirty = false;
        debug!(path = %self.record_path.display(), "flushed fingerprints");
        Ok(true)
    }
}

/// Parses a fingerprint record. Returns `None` if any line is malformed.
fn parse_record(text: &str) -> Option<HashMap<SourcePath, Fingerprint>> {
    let mut entries = HashMap::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let (path, fp) = line.split_once(' ')?;
        let path = SourcePath::new(path).ok()?;
        let fp = Fingerprint::parse(fp)?;
        entries.insert(path, fp);
    }
    Some(entries)
}

fn render_record(entries: &HashMap<SourcePath, Fingerprint>) -> String {
    let mut lines: Vec<_> = entries
        .iter()
        .filter(|(path, _)| {
            if path.needs_escaping() {
                warn!("not recording fingerprint for {path}: path contains a separator");
                return false;
            }
            true
        })
        .map(|(path, fp)| format!("{path} {fp}\n"))
        .collect();
    // Sort for stable diffs of the record
    lines.sort();
    lines.concat()
}
