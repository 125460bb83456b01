//! Errors raised while reading `kiln.toml`.

use std::path::PathBuf;

/// Why a `kiln.toml` could not be turned into a usable [`ProjectConfig`](crate::ProjectConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// The configuration file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the expected schema.
    #[error("malformed kiln.toml: {0}")]
    Parse(String),

    /// A required key is missing or empty.
    #[error("`{0}` must be set")]
    MissingField(&'static str),

    /// A directory kiln creates or deletes points somewhere it must not.
    ///
    /// `kiln clean` removes these directories recursively, so they must stay
    /// strictly inside the project root and apart from the sources.
    #[error("`{field}` = {value:?} {reason}")]
    UnsafeDirectory {
        /// The offending key, e.g. `compile.object_dir`.
        field: &'static str,
        /// The configured value.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Any other value that is out of range or inconsistent.
    #[error("`{field}` {reason}")]
    Invalid {
        /// The offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
