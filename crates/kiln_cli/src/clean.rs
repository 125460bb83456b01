//! `kiln clean`: remove recorded state and object files.

use std::path::{Path, PathBuf};

use kiln_common::SourcePath;

use crate::pipeline::resolve_project_root;
use crate::GlobalArgs;

/// Runs the `kiln clean` command.
///
/// Removes the state directory and the object directory. Either may already
/// be absent. The next build after a clean is a cold build.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = kiln_config::load_config(&project_dir)?;

    let targets = [
        owned_dir(&project_dir, &config.build.state_dir)?,
        owned_dir(&project_dir, &config.compile.object_dir)?,
    ];
    for target in &targets {
        if remove_dir(target)? && !global.quiet {
            eprintln!("    Removed {}", target.display());
        }
    }
    Ok(0)
}

/// Resolves a configured directory under `root`, refusing anything that is
/// the root itself or lies outside it.
fn owned_dir(root: &Path, dir: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let rel = SourcePath::new(dir)
        .map_err(|e| format!("refusing to remove {dir:?}: {e}"))?;
    if rel.escapes_root() {
        return Err(format!("refusing to remove {dir:?}: outside the project root").into());
    }
    Ok(rel.to_fs_path(root))
}

/// Removes `dir` recursively. Returns `false` if it did not exist.
fn remove_dir(dir: &Path) -> std::io::Result<bool> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
