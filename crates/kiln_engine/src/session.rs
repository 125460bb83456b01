//! One build run against the persisted state directory.

use std::path::{Path, PathBuf};

use kiln_cache::{FingerprintStore, FingerprintStrategy, IncludeGraphStore};
use kiln_common::SourcePath;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::pool::BatchReport;
use crate::resolver::StalenessResolver;

/// Owns both stores for the duration of one run.
///
/// Open it at the start of a build, ask it which sources are stale, run the
/// commands, report failures back, then [`finish`](Self::finish) to persist
/// what changed. Dropping a session without finishing discards the run's
/// state changes, which is what a failed resolution wants.
pub struct BuildSession {
    fingerprints: FingerprintStore,
    includes: IncludeGraphStore,
}

impl BuildSession {
    /// Loads both records from `state_dir`.
    ///
    /// `root` is the project root every [`SourcePath`] is relative to;
    /// `search_paths` are the include directories, tried in order.
    pub fn open(
        root: &Path,
        state_dir: &Path,
        search_paths: Vec<PathBuf>,
        strategy: Box<dyn FingerprintStrategy>,
    ) -> Self {
        Self {
            fingerprints: FingerprintStore::load(state_dir, root, strategy),
            includes: IncludeGraphStore::load(state_dir, root, search_paths),
        }
    }

    /// Returns a resolver borrowing this session's stores.
    ///
    /// Each resolver carries its own memo, so use one resolver for all the
    /// questions of a run.
    pub fn resolver(&mut self) -> StalenessResolver<'_> {
        StalenessResolver::new(&mut self.fingerprints, &mut self.includes)
    }

    /// Returns the subset of `sources` that needs rebuilding, in input order.
    ///
    /// Fails on the first include cycle found; nothing should be built then.
    pub fn stale_sources(&mut self, sources: &[SourcePath]) -> Result<Vec<SourcePath>, EngineError> {
        let mut resolver = self.resolver();
        let mut stale = Vec::new();
        for source in sources {
            if !resolver.is_up_to_date(source)? {
                stale.push(source.clone());
            }
        }
        debug!(
            checked = sources.len(),
            stale = stale.len(),
            resolved = resolver.resolved_count(),
            "staleness resolved"
        );
        Ok(stale)
    }

    /// Forgets the fingerprints of sources whose command failed, so the next
    /// run rebuilds them.
    pub fn record_failures(&mut self, report: &BatchReport) {
        for failed in report.failures() {
            if let Some(source) = failed.command.source() {
                debug!(%source, "forgetting fingerprint of failed build");
                self.fingerprints.forget(source);
            }
        }
    }

    /// Returns the fingerprint store.
    pub fn fingerprints(&self) -> &FingerprintStore {
        &self.fingerprints
    }

    /// Returns the include graph store.
    pub fn includes(&self) -> &IncludeGraphStore {
        &self.includes
    }

    /// Persists whichever records changed during the run.
    ///
    /// A failed write is logged and otherwise ignored: the next run simply
    /// rebuilds what could not be recorded. Returns `true` if everything
    /// that needed writing was written.
    pub fn finish(mut self) -> bool {
        let mut ok = true;
        if let Err(e) = self.fingerprints.flush_if_dirty() {
            warn!("could not save fingerprints: {e}");
            ok = false;
        }
        if let Err(e) = self.includes.flush_if_dirty() {
            warn!("could not save include graph: {e}");
            ok = false;
        }
        ok
    }
}
