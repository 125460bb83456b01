//! Error types for staleness resolution.

use kiln_common::SourcePath;

/// Errors that stop a build before any command runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A file transitively includes itself, so its staleness is undefined.
    #[error("include cycle detected at {path}: {}", render_chain(.chain))]
    IncludeCycle {
        /// The file reached a second time while still being resolved.
        path: SourcePath,
        /// The include chain from `path` back to itself.
        chain: Vec<SourcePath>,
    },
}

fn render_chain(chain: &[SourcePath]) -> String {
    chain
        .iter()
        .map(SourcePath::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_names_path_and_chain() {
        let a = SourcePath::new("a.h").unwrap();
        let b = SourcePath::new("b.h").unwrap();
        let err = EngineError::IncludeCycle {
            path: a.clone(),
            chain: vec![a.clone(), b, a],
        };
        assert_eq!(
            err.to_string(),
            "include cycle detected at a.h: a.h -> b.h -> a.h"
        );
    }
}
