//! Normalized, project-relative source paths.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

/// Errors produced when a filesystem path cannot be turned into a [`SourcePath`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourcePathError {
    /// The path normalizes to nothing (e.g. `""` or `"a/.."`).
    #[error("path '{0}' does not name a file")]
    Empty(PathBuf),

    /// The path is absolute and cannot be used as a relative key.
    #[error("path '{0}' is absolute")]
    Absolute(PathBuf),

    /// The path is absolute and does not live under the project root.
    #[error("path '{path}' is outside project root '{root}'")]
    OutsideRoot {
        /// The offending path.
        path: PathBuf,
        /// The project root it was expected under.
        root: PathBuf,
    },

    /// A path component is not valid UTF-8.
    #[error("path '{0}' is not valid UTF-8")]
    NonUtf8(PathBuf),
}

/// A lexically normalized path relative to the project root.
///
/// `SourcePath` is the key of every persisted record. `.` components are
/// dropped, `..` cancels the preceding component where one exists, and
/// components are joined with `/` on every platform, so the same logical file
/// produces the same key across runs. Leading `..` components are kept, which
/// lets include search paths point outside the project.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SourcePath(String);

impl SourcePath {
    /// Normalizes a relative path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SourcePathError> {
        let path = path.as_ref();
        let mut parts: Vec<&str> = Vec::new();
        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(SourcePathError::Absolute(path.to_path_buf()));
                }
                Component::CurDir => {}
                Component::ParentDir => match parts.last() {
                    Some(&last) if last != ".." => {
                        parts.pop();
                    }
                    _ => parts.push(".."),
                },
                Component::Normal(os) => {
                    let s = os
                        .to_str()
                        .ok_or_else(|| SourcePathError::NonUtf8(path.to_path_buf()))?;
                    parts.push(s);
                }
            }
        }
        if parts.is_empty() || parts.last() == Some(&"..") {
            return Err(SourcePathError::Empty(path.to_path_buf()));
        }
        Ok(Self(parts.join("/")))
    }

    /// Normalizes a filesystem path against the project root.
    ///
    /// Absolute paths must live under `root`; relative paths are taken to be
    /// relative to `root` already.
    pub fn from_fs(root: &Path, path: &Path) -> Result<Self, SourcePathError> {
        if path.is_absolute() {
            let rel = path
                .strip_prefix(root)
                .map_err(|_| SourcePathError::OutsideRoot {
                    path: path.to_path_buf(),
                    root: root.to_path_buf(),
                })?;
            Self::new(rel)
        } else {
            Self::new(path)
        }
    }

    /// Returns the on-disk location of this path under `root`.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    /// Returns the normalized text of this path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the path leads out of the project root.
    pub fn escapes_root(&self) -> bool {
        self.0 == ".." || self.0.starts_with("../")
    }

    /// Returns `true` if `other` is this path or lies beneath it.
    pub fn contains(&self, other: &SourcePath) -> bool {
        other.0 == self.0
            || other
                .0
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Returns `true` if the text cannot be stored in a line record, where a
    /// space separates the key from its value and commas separate list items.
    pub fn needs_escaping(&self) -> bool {
        self.0.chars().any(|c| c.is_whitespace() || c == ',')
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourcePath({})", self.0)
    }
}

impl AsRef<str> for SourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
