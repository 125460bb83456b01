//! Persistent per-file include graph.
//!
//! The record is stored as `includes` in the state directory, one
//! `<source path> <include>,<include>,...` line per file. Files that include
//! nothing resolvable are left out, so "absent from the record" means either
//! "never scanned" or "scanned, includes nothing". The in-memory resolved set
//! tells the two apart within a run.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use kiln_common::SourcePath;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::record;
use crate::scan::scan_includes;

/// Name of the include record within the state directory.
pub const RECORD_FILE: &str = "includes";

/// Tracks the resolved include list of every scanned source file.
pub struct IncludeGraphStore {
    record_path: PathBuf,
    root: PathBuf,
    search_paths: Vec<PathBuf>,
    entries: HashMap<SourcePath, Vec<SourcePath>>,
    /// Paths rescanned during this run.
    resolved: HashSet<SourcePath>,
    dirty: bool,
    scans: usize,
}

impl IncludeGraphStore {
    /// Loads the include record from `state_dir`.
    ///
    /// `search_paths` are tried in order when resolving an include target;
    /// relative entries are taken relative to `root`. A missing or malformed
    /// record yields an empty graph.
    pub fn load(state_dir: &Path, root: &Path, search_paths: Vec<PathBuf>) -> Self {
        let record_path = state_dir.join(RECORD_FILE);
        let entries = match record::read(&record_path) {
            Some(text) => parse_record(&text).unwrap_or_else(|| {
                debug!(path = %record_path.display(), "discarding malformed include record");
                HashMap::new()
            }),
            None => HashMap::new(),
        };
        debug!(entries = entries.len(), "loaded include graph");
        Self {
            record_path,
            root: root.to_path_buf(),
            search_paths,
            entries,
            resolved: HashSet::new(),
            dirty: false,
            scans: 0,
        }
    }

    /// Rescans `path` and returns its freshly resolved include list.
    ///
    /// Each include target is looked up in the search paths in order and the
    /// first existing file wins. Targets found nowhere (typically system
    /// headers) are dropped. The store is marked dirty when the list differs
    /// from the one previously known.
    pub fn resolve(&mut self, path: &SourcePath) -> &[SourcePath] {
        self.rescan(path);
        self.includes(path)
    }

    /// Returns `true` if the include list of `path` differs from the one
    /// previously known.
    ///
    /// The first call for a path in a run forces a rescan; later calls, and
    /// calls after [`resolve`](Self::resolve), report `false`.
    pub fn includes_changed(&mut self, path: &SourcePath) -> bool {
        if self.resolved.contains(path) {
            return false;
        }
        self.rescan(path)
    }

    /// Returns the known include list of `path`, empty if none is recorded.
    pub fn includes(&self, path: &SourcePath) -> &[SourcePath] {
        self.entries.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns `true` if `path` was rescanned during this run.
    pub fn is_resolved(&self, path: &SourcePath) -> bool {
        self.resolved.contains(path)
    }

    /// Returns `true` if the include target still exists on disk.
    pub fn locate(&self, target: &SourcePath) -> bool {
        target.to_fs_path(&self.root).is_file()
    }

    /// Returns how many source files were scanned during this run.
    pub fn scan_count(&self) -> usize {
        self.scans
    }

    /// Returns `true` if the in-memory graph differs from the loaded record.
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
        debug!(path = %self.record_path.display(), "flushed include graph");
        Ok(true)
    }

    /// Scans and resolves `path`, returning whether its list changed.
    fn rescan(&mut self, path: &SourcePath) -> bool {
        self.resolved.insert(path.clone());
        self.scans += 1;

        let fs_path = path.to_fs_path(&self.root);
        let fresh = match std::fs::read(&fs_path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let mut list: Vec<SourcePath> = Vec::new();
                for raw in scan_includes(&text) {
                    match self.find_include(raw) {
                        Some(found) if !list.contains(&found) => list.push(found),
                        Some(_) => {}
                        None => debug!(%path, include = raw, "include not on search path"),
                    }
                }
                list
            }
            Err(e) => {
                warn!("cannot scan {path} for includes: {e}");
                Vec::new()
            }
        };

        let changed = self.includes(path) != fresh.as_slice();
        if changed {
            debug!(%path, count = fresh.len(), "include list changed");
            self.dirty = true;
            if fresh.is_empty() {
                self.entries.remove(path);
            } else {
                self.entries.insert(path.clone(), fresh);
            }
        }
        changed
    }

    /// Maps a raw include target to the first existing file on the search path.
    fn find_include(&self, raw: &str) -> Option<SourcePath> {
        self.search_paths.iter().find_map(|dir| {
            let candidate = dir.join(raw);
            let path = SourcePath::from_fs(&self.root, &candidate).ok()?;
            self.locate(&path).then_some(path)
        })
    }
}

/// Parses an include record. Returns `None` if any line is malformed.
fn parse_record(text: &str) -> Option<HashMap<SourcePath, Vec<SourcePath>>> {
    let mut entries = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (path, list) = line.split_once(' ')?;
        let path = SourcePath::new(path).ok()?;
        let list = list
            .split(',')
            .map(|item| SourcePath::new(item).ok())
            .collect::<Option<Vec<_>>>()?;
        entries.insert(path, list);
    }
    Some(entries)
}

fn render_record(entries: &HashMap<SourcePath, Vec<SourcePath>>) -> String {
    let mut lines: Vec<String> = entries
        .iter()
        .filter(|(_, list)| !list.is_empty())
        .filter(|(path, list)| {
            if path.needs_escaping() || list.iter().any(SourcePath::needs_escaping) {
                warn!("not recording includes of {path}: path contains a separator");
                return false;
            }
            true
        })
        .map(|(path, list)| {
            let joined: Vec<&str> = list.iter().map(SourcePath::as_str).collect();
            format!("{path} {}\n", joined.join(","))
        })
        .collect();
    // Sort for stable diffs of the record
    lines.sort();
    lines.concat()
}
