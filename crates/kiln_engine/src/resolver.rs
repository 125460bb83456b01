//! Transitive staleness resolution over the include graph.
//!
//! A file is up to date when its own fingerprint is unchanged, its include
//! list is unchanged, and every file it includes is itself up to date.
//! Results are memoized per run, so a header shared by many sources is
//! fingerprinted and scanned once. The walk keeps an explicit stack instead
//! of recursing, so arbitrarily deep include chains cannot exhaust the
//! thread's stack.

use std::collections::HashMap;

use kiln_cache::{FingerprintStore, IncludeGraphStore};
use kiln_common::SourcePath;
use tracing::debug;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoState {
    InProgress,
    Done(bool),
}

/// A file whose include targets are still being walked.
struct Frame {
    path: SourcePath,
    up_to_date: bool,
    includes: Vec<SourcePath>,
    next: usize,
}

/// Decides whether source files need rebuilding.
///
/// Borrows both stores for the duration of one run and owns the per-run memo.
/// Asking about a file records fresh fingerprints and include lists in the
/// stores as a side effect; the caller flushes them when the run ends.
pub struct StalenessResolver<'a> {
    fingerprints: &'a mut FingerprintStore,
    includes: &'a mut IncludeGraphStore,
    memo: HashMap<SourcePath, MemoState>,
}

impl<'a> StalenessResolver<'a> {
    /// Creates a resolver with an empty memo.
    pub fn new(fingerprints: &'a mut FingerprintStore, includes: &'a mut IncludeGraphStore) -> Self {
        Self {
            fingerprints,
            includes,
            memo: HashMap::new(),
        }
    }

    /// Returns `true` if `path` and everything it transitively includes are
    /// unchanged since the last recorded run.
    ///
    /// Fails only when the walk finds an include cycle; the error names the
    /// file reached twice and the chain leading back to it. Include targets
    /// that no longer exist are not an error, they just make the includer
    /// stale. After an error the resolver stays usable: files left undecided
    /// by the aborted walk are walked again on the next query.
    pub fn is_up_to_date(&mut self, path: &SourcePath) -> Result<bool, EngineError> {
        if let Some(MemoState::Done(up_to_date)) = self.memo.get(path) {
            return Ok(*up_to_date);
        }
        let result = self.walk(path);
        if result.is_err() {
            self.memo.retain(|_, state| *state != MemoState::InProgress);
        }
        result
    }

    fn walk(&mut self, path: &SourcePath) -> Result<bool, EngineError> {
        let mut stack = vec![self.enter(path.clone())];
        while let Some(frame) = stack.last_mut() {
            if let Some(target) = frame.includes.get(frame.next).cloned() {
                frame.next += 1;
                if !self.includes.locate(&target) {
                    debug!(path = %frame.path, include = %target, "stale: include missing");
                    frame.up_to_date = false;
                    continue;
                }
                match self.memo.get(&target).copied() {
                    Some(MemoState::Done(up_to_date)) => {
                        if !up_to_date {
                            frame.up_to_date = false;
                        }
                    }
                    Some(MemoState::InProgress) => return Err(cycle_error(&stack, target)),
                    None => {
                        let child = self.enter(target);
                        stack.push(child);
                    }
                }
                continue;
            }

            let Some(done) = stack.pop() else { break };
            if !done.up_to_date {
                debug!(path = %done.path, "stale");
            }
            self.memo
                .insert(done.path.clone(), MemoState::Done(done.up_to_date));
            match stack.last_mut() {
                Some(parent) => {
                    if !done.up_to_date {
                        parent.up_to_date = false;
                    }
                }
                None => return Ok(done.up_to_date),
            }
        }
        // The root frame is always popped through the `None` arm above.
        Ok(matches!(self.memo.get(path), Some(MemoState::Done(true))))
    }

    /// Returns the number of files whose staleness has been decided.
    pub fn resolved_count(&self) -> usize {
        self.memo
            .values()
            .filter(|s| matches!(s, MemoState::Done(_)))
            .count()
    }

    /// Marks `path` in progress and evaluates its own fingerprint and
    /// include list, leaving its include targets to the caller's walk.
    fn enter(&mut self, path: SourcePath) -> Frame {
        self.memo.insert(path.clone(), MemoState::InProgress);
        let mut up_to_date = true;
        if self.fingerprints.is_changed(&path) {
            debug!(%path, "stale: content changed");
            up_to_date = false;
            // A changed file may include different files now.
            self.includes.resolve(&path);
        }
        if self.includes.includes_changed(&path) {
            debug!(%path, "stale: include list changed");
            up_to_date = false;
        }
        let includes = self.includes.includes(&path).to_vec();
        Frame {
            path,
            up_to_date,
            includes,
            next: 0,
        }
    }
}

/// Builds the cycle error for `target`, which is already on the walk stack.
fn cycle_error(stack: &[Frame], target: SourcePath) -> EngineError {
    let start = stack
        .iter()
        .position(|f| f.path == target)
        .unwrap_or(0);
    let mut chain: Vec<SourcePath> = stack[start..].iter().map(|f| f.path.clone()).collect();
    chain.push(target.clone());
    EngineError::IncludeCycle {
        path: target,
        chain,
    }
}
