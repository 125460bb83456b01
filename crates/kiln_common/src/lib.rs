//! Shared foundational types used across the Kiln build engine.
//!
//! This crate provides the normalized [`SourcePath`] key used by every store
//! and the opaque [`Fingerprint`] value compared between runs.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod source_path;

pub use fingerprint::Fingerprint;
pub use source_path::{SourcePath, SourcePathError};
