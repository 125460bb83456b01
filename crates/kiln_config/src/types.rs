//! Configuration types deserialized from `kiln.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;

/// The top-level project configuration parsed from `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Engine settings (state directory, workers, fingerprinting, includes).
    #[serde(default)]
    pub build: BuildConfig,
    /// How sources are discovered and turned into compile commands.
    #[serde(default)]
    pub compile: CompileConfig,
}

/// Core project metadata required in every `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default)]
    pub version: String,
}

/// Settings for the incremental engine itself.
#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    /// Directory (relative to the project root) holding persisted state.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Upper bound on concurrently running build commands.
    ///
    /// When unset, the number of available CPUs is used.
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// How file fingerprints are derived.
    #[serde(default)]
    pub fingerprint: FingerprintMethod,
    /// Directories searched, in order, when resolving include directives.
    ///
    /// Accepts either a single string or a list of strings.
    #[serde(
        default = "default_include_paths",
        deserialize_with = "deserialize_string_or_vec"
    )]
    pub include_paths: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            max_workers: None,
            fingerprint: FingerprintMethod::default(),
            include_paths: default_include_paths(),
        }
    }
}

impl BuildConfig {
    /// Returns the effective worker limit, always at least 1.
    pub fn worker_limit(&self) -> usize {
        self.max_workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Fingerprint derivation method.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMethod {
    /// Hash the full file content (default). Exact, costs a full read.
    #[default]
    Content,
    /// Use the modification time. Cheap, but blind to changes that keep the
    /// timestamp and rebuilds on touch-only changes.
    Mtime,
}

/// Source discovery and compile command construction.
#[derive(Debug, Deserialize)]
pub struct CompileConfig {
    /// Directories (relative to the project root) scanned for sources.
    #[serde(
        default = "default_source_dirs",
        deserialize_with = "deserialize_string_or_vec"
    )]
    pub sources: Vec<String>,
    /// File extensions (without the dot) treated as compilable sources.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory receiving object files, mirroring the source layout.
    #[serde(default = "default_object_dir")]
    pub object_dir: String,
    /// Extension given to object files.
    #[serde(default = "default_object_ext")]
    pub object_ext: String,
    /// Command template run once per stale source.
    ///
    /// `{source}`, `{object}` and `{flags}` are substituted.
    #[serde(default = "default_command")]
    pub command: String,
    /// Extra flags spliced into `{flags}`.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub flags: Vec<String>,
    /// Preprocessor definitions rendered as `-D KEY=VALUE`.
    #[serde(default)]
    pub defines: BTreeMap<String, DefineValue>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            sources: default_source_dirs(),
            extensions: default_extensions(),
            object_dir: default_object_dir(),
            object_ext: default_object_ext(),
            command: default_command(),
            flags: Vec::new(),
            defines: BTreeMap::new(),
        }
    }
}

/// The value of a preprocessor definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DefineValue {
    /// Booleans render as `1` or `0`.
    Bool(bool),
    /// An integer literal.
    Integer(i64),
    /// A floating-point literal.
    Float(f64),
    /// Any other text, rendered verbatim.
    Text(String),
}

impl fmt::Display for DefineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineValue::Bool(b) => write!(f, "{}", i32::from(*b)),
            DefineValue::Integer(i) => write!(f, "{i}"),
            DefineValue::Float(x) => write!(f, "{x}"),
            DefineValue::Text(s) => f.write_str(s),
        }
    }
}

fn default_state_dir() -> String {
    ".kiln".to_string()
}

fn default_include_paths() -> Vec<String> {
    vec!["./".to_string()]
}

fn default_source_dirs() -> Vec<String> {
    vec!["src".to_string()]
}

fn default_extensions() -> Vec<String> {
    ["c", "cc", "cpp", "cxx"].iter().map(|s| s.to_string()).collect()
}

fn default_object_dir() -> String {
    "build".to_string()
}

fn default_object_ext() -> String {
    "o".to_string()
}

fn default_command() -> String {
    "cc -c {source} -o {object} {flags}".to_string()
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows `include_paths = "include"` as well as `include_paths = ["a", "b"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_value_rendering() {
        assert_eq!(DefineValue::Bool(true).to_string(), "1");
        assert_eq!(DefineValue::Bool(false).to_string(), "0");
        assert_eq!(DefineValue::Integer(-3).to_string(), "-3");
        assert_eq!(DefineValue::Float(0.5).to_string(), "0.5");
        assert_eq!(DefineValue::Text("float".into()).to_string(), "float");
    }

    #[test]
    fn worker_limit_never_zero() {
        let mut build = BuildConfig::default();
        build.max_workers = Some(0);
        assert_eq!(build.worker_limit(), 1);
        build.max_workers = Some(6);
        assert_eq!(build.worker_limit(), 6);
        build.max_workers = None;
        assert!(build.worker_limit() >= 1);
    }

    #[test]
    fn defaults_match_serde_defaults() {
        let build = BuildConfig::default();
        assert_eq!(build.state_dir, ".kiln");
        assert_eq!(build.include_paths, vec!["./"]);
        assert_eq!(build.fingerprint, FingerprintMethod::Content);

        let compile = CompileConfig::default();
        assert_eq!(compile.sources, vec!["src"]);
        assert_eq!(compile.object_ext, "o");
        assert!(compile.command.contains("{source}"));
    }
}
