//! `kiln status`: list stale sources without building.
//!
//! The session is never finished, so asking does not change what the next
//! `kiln build` sees.

use kiln_common::SourcePath;
use serde::Serialize;

use crate::pipeline::{discover_sources, open_session, resolve_project_root};
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// Machine-readable status report.
#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    project: &'a str,
    sources: usize,
    stale: &'a [SourcePath],
}

/// Runs the `kiln status` command.
///
/// Returns exit code 0 when the list was produced, 1 on an include cycle.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = kiln_config::load_config(&project_dir)?;
    let sources = discover_sources(&project_dir, &config.compile)?;

    let mut session = open_session(&project_dir, &config);
    let stale = match session.stale_sources(&sources) {
        Ok(stale) => stale,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(1);
        }
    };

    match args.format {
        ReportFormat::Text => {
            for source in &stale {
                println!("{source}");
            }
            if !global.quiet {
                eprintln!(
                    "  {} of {} sources need rebuilding",
                    stale.len(),
                    sources.len()
                );
            }
        }
        ReportFormat::Json => {
            let report = StatusReport {
                project: &config.project.name,
                sources: sources.len(),
                stale: &stale,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(0)
}
