//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use kiln_common::SourcePath;
use std::path::Path;

/// Name of the configuration file at the project root.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name"));
    }
    if config.build.state_dir.trim().is_empty() {
        return Err(ConfigError::MissingField("build.state_dir"));
    }
    if config.build.max_workers == Some(0) {
        return Err(ConfigError::Invalid {
            field: "build.max_workers",
            reason: "must be at least 1".to_string(),
        });
    }
    if config.build.include_paths.is_empty() {
        return Err(ConfigError::Invalid {
            field: "build.include_paths",
            reason: "must name at least one directory".to_string(),
        });
    }
    if !config.compile.command.contains("{source}") {
        return Err(ConfigError::Invalid {
            field: "compile.command",
            reason: "must contain the {source} placeholder".to_string(),
        });
    }
    if let Some(ext) = config.compile.extensions.iter().find(|e| e.starts_with('.')) {
        return Err(ConfigError::Invalid {
            field: "compile.extensions",
            reason: format!("entry {ext:?} must be written without a leading dot"),
        });
    }

    // A source directory naming the root itself does not normalize; any
    // owned directory is then necessarily below it, which is fine.
    let sources: Vec<SourcePath> = config
        .compile
        .sources
        .iter()
        .filter_map(|dir| SourcePath::new(dir).ok())
        .collect();
    validate_owned_dir("build.state_dir", &config.build.state_dir, &sources)?;
    validate_owned_dir("compile.object_dir", &config.compile.object_dir, &sources)?;
    Ok(())
}

/// Checks a directory that kiln writes into and `kiln clean` deletes.
///
/// It must be relative, strictly below the project root, and must not hold
/// any configured source directory.
fn validate_owned_dir(
    field: &'static str,
    value: &str,
    sources: &[SourcePath],
) -> Result<(), ConfigError> {
    let unsafe_dir = |reason| ConfigError::UnsafeDirectory {
        field,
        value: value.to_string(),
        reason,
    };
    if Path::new(value).is_absolute() {
        return Err(unsafe_dir("must be relative to the project root"));
    }
    let dir = SourcePath::new(value)
        .map_err(|_| unsafe_dir("must name a directory below the project root"))?;
    if dir.escapes_root() {
        return Err(unsafe_dir("must stay inside the project root"));
    }
    if sources.iter().any(|src| dir.contains(src)) {
        return Err(unsafe_dir("would contain a source directory"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DefineValue, FingerprintMethod};

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[project]
name = "mobile-ops"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.name, "mobile-ops");
        assert_eq!(config.build.state_dir, ".kiln");
        assert_eq!(config.build.include_paths, vec!["./"]);
        assert_eq!(config.build.fingerprint, FingerprintMethod::Content);
        assert!(config.build.max_workers.is_none());
        assert_eq!(config.compile.object_dir, "build");
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "ops"
version = "0.3.0"

[build]
state_dir = "build/state"
max_workers = 8
fingerprint = "mtime"
include_paths = ["./", "inc", "third_party/include"]

[compile]
sources = ["src", "ops"]
extensions = ["cpp", "cu"]
object_dir = "build/obj"
object_ext = "obj"
command = "g++ -c {source} -o {object} {flags}"
flags = ["-O3", "-fPIC"]

[compile.defines]
USING_CUDA = false
NUM_THREADS = 4
DTYPE = "float"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.version, "0.3.0");
        assert_eq!(config.build.state_dir, "build/state");
        assert_eq!(config.build.max_workers, Some(8));
        assert_eq!(config.build.worker_limit(), 8);
        assert_eq!(config.build.fingerprint, FingerprintMethod::Mtime);
        assert_eq!(config.build.include_paths.len(), 3);
        assert_eq!(config.compile.sources, vec!["src", "ops"]);
        assert_eq!(config.compile.extensions, vec!["cpp", "cu"]);
        assert_eq!(config.compile.object_ext, "obj");
        assert_eq!(config.compile.flags, vec!["-O3", "-fPIC"]);
        assert_eq!(
            config.compile.defines["USING_CUDA"],
            DefineValue::Bool(false)
        );
        assert_eq!(config.compile.defines["NUM_THREADS"], DefineValue::Integer(4));
        assert_eq!(
            config.compile.defines["DTYPE"],
            DefineValue::Text("float".to_string())
        );
    }

    #[test]
    fn include_paths_accepts_single_string() {
        let toml = r#"
[project]
name = "x"

[build]
include_paths = "include"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.build.include_paths, vec!["include"]);
    }

    #[test]
    fn flags_accepts_single_string() {
        let toml = r#"
[project]
name = "x"

[compile]
flags = "-Wall -Wextra"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.compile.flags, vec!["-Wall -Wextra"]);
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[project]
name = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn zero_workers_errors() {
        let toml = r#"
[project]
name = "x"

[build]
max_workers = 0
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn empty_include_paths_errors() {
        let toml = r#"
[project]
name = "x"

[build]
include_paths = []
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn command_without_source_placeholder_errors() {
        let toml = r#"
[project]
name = "x"

[compile]
command = "make all"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn dotted_extension_errors() {
        let toml = r#"
[project]
name = "x"

[compile]
extensions = [".c"]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn unknown_fingerprint_method_errors() {
        let toml = r#"
[project]
name = "x"

[build]
fingerprint = "sha1"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nname = \"ondisk\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "ondisk");
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    fn owned_dir_error(build: &str, compile: &str) -> ConfigError {
        let toml = format!("[project]\nname = \"x\"\n[build]\n{build}\n[compile]\n{compile}\n");
        load_config_from_str(&toml).unwrap_err()
    }

    #[test]
    fn object_dir_must_not_be_the_root() {
        for value in [".", "./", "", "src/..", "build/../."] {
            let err = owned_dir_error("", &format!("object_dir = {value:?}"));
            assert!(
                matches!(err, ConfigError::UnsafeDirectory { field: "compile.object_dir", .. }),
                "{value:?} accepted"
            );
        }
    }

    #[test]
    fn object_dir_must_stay_inside_the_root() {
        for value in ["..", "../out", "/tmp/out", "build/../../out"] {
            let err = owned_dir_error("", &format!("object_dir = {value:?}"));
            assert!(
                matches!(err, ConfigError::UnsafeDirectory { field: "compile.object_dir", .. }),
                "{value:?} accepted"
            );
        }
    }

    #[test]
    fn state_dir_must_not_be_the_root() {
        for value in [".", "..", "/var/kiln"] {
            let err = owned_dir_error(&format!("state_dir = {value:?}"), "");
            assert!(
                matches!(err, ConfigError::UnsafeDirectory { field: "build.state_dir", .. }),
                "{value:?} accepted"
            );
        }
    }

    #[test]
    fn owned_dir_must_not_hold_sources() {
        let err = owned_dir_error("", "sources = [\"src\"]\nobject_dir = \"src\"");
        assert!(matches!(err, ConfigError::UnsafeDirectory { .. }));
        let err = owned_dir_error("", "sources = [\"lib/core\"]\nobject_dir = \"lib\"");
        assert!(matches!(err, ConfigError::UnsafeDirectory { .. }));
        let err = owned_dir_error("state_dir = \"src\"", "");
        assert!(matches!(err, ConfigError::UnsafeDirectory { field: "build.state_dir", .. }));
    }

    #[test]
    fn nested_owned_dirs_are_accepted() {
        let toml = r#"
[project]
name = "x"

[build]
state_dir = "out/.kiln"

[compile]
sources = [".", "src"]
object_dir = "out/obj"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.compile.object_dir, "out/obj");
    }
}
