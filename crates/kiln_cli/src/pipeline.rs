//! Shared pipeline helpers for CLI commands.
//!
//! Project root resolution, source discovery, and opening a build session
//! from the loaded configuration.

use std::path::{Path, PathBuf};

use kiln_cache::{ContentStrategy, FingerprintStrategy, MtimeStrategy};
use kiln_common::SourcePath;
use kiln_config::{CompileConfig, FingerprintMethod, ProjectConfig, CONFIG_FILE};
use kiln_engine::BuildSession;
use tracing::{debug, warn};

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
///
/// Returns the directory containing `kiln.toml`, or an error if none is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `kiln.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let root = if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            p
        }
    } else {
        find_project_root(&std::env::current_dir()?)?
    };
    // Sources are stored relative to the root, so it must be absolute.
    Ok(std::path::absolute(root)?)
}

/// Discovers compilable sources under the configured source directories.
///
/// Walks each directory recursively, keeps files whose extension is listed in
/// `compile.extensions`, and returns them relative to `root`, sorted and
/// deduplicated. Hidden directories are skipped. Missing source directories
/// are logged and ignored.
pub fn discover_sources(
    root: &Path,
    compile: &CompileConfig,
) -> Result<Vec<SourcePath>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for dir in &compile.sources {
        let dir = root.join(dir);
        if !dir.is_dir() {
            warn!("source directory {} does not exist", dir.display());
            continue;
        }
        walk_dir(&dir, &compile.extensions, &mut files)?;
    }

    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        sources.push(SourcePath::from_fs(root, &file)?);
    }
    sources.sort();
    sources.dedup();
    debug!(count = sources.len(), "discovered sources");
    Ok(sources)
}

/// Recursively walks a directory collecting files with a matching extension.
fn walk_dir(
    dir: &Path,
    extensions: &[String],
    files: &mut Vec<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if !is_hidden(&path) {
                walk_dir(&path, extensions, files)?;
            }
        } else if has_extension(&path, extensions) {
            files.push(path);
        }
    }
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e == ext))
}

/// Returns the fingerprint strategy selected by the configuration.
pub fn fingerprint_strategy(method: FingerprintMethod) -> Box<dyn FingerprintStrategy> {
    match method {
        FingerprintMethod::Content => Box::new(ContentStrategy),
        FingerprintMethod::Mtime => Box::new(MtimeStrategy),
    }
}

/// Opens a build session on the project's state directory.
pub fn open_session(root: &Path, config: &ProjectConfig) -> BuildSession {
    let search_paths = config
        .build
        .include_paths
        .iter()
        .map(PathBuf::from)
        .collect();
    BuildSession::open(
        root,
        &state_dir(root, config),
        search_paths,
        fingerprint_strategy(config.build.fingerprint),
    )
}

/// Returns the absolute state directory of the project.
pub fn state_dir(root: &Path, config: &ProjectConfig) -> PathBuf {
    root.join(&config.build.state_dir)
}
