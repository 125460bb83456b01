//! Persistent build state for incremental rebuilds.
//!
//! This crate owns the two records that survive between runs: per-file change
//! fingerprints ([`FingerprintStore`]) and per-file resolved include lists
//! ([`IncludeGraphStore`]). Both load fail-safe, track a dirty flag, and write
//! themselves back only when something changed.

#![warn(missing_docs)]

pub mod error;
pub mod fingerprints;
pub mod includes;
mod record;
pub mod scan;
pub mod strategy;

pub use error::CacheError;
pub use fingerprints::FingerprintStore;
pub use includes::IncludeGraphStore;
pub use scan::{parse_include_directive, scan_includes};
pub use strategy::{ContentStrategy, FingerprintStrategy, MtimeStrategy};
