//! `kiln build`: rebuild every stale source.
//!
//! 1. Find the project root and load `kiln.toml`
//! 2. Discover sources
//! 3. Resolve staleness against the recorded state
//! 4. Run one compile command per stale source on the worker pool
//! 5. Forget failed sources and persist the state

use kiln_engine::{BatchReport, BuildPool, ShellExecutor};

use crate::pipeline::{discover_sources, open_session, resolve_project_root};
use crate::plan::{ensure_object_dirs, plan_compiles};
use crate::{BuildArgs, GlobalArgs};

/// Runs the `kiln build` command.
///
/// Returns exit code 0 when everything is up to date or rebuilt, 1 when a
/// command failed or the include graph has a cycle.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = kiln_config::load_config(&project_dir)?;

    if !global.quiet {
        eprintln!(
            "   Building {} v{}",
            config.project.name, config.project.version
        );
    }

    let sources = discover_sources(&project_dir, &config.compile)?;
    if sources.is_empty() {
        eprintln!(
            "error: no source files found in {}",
            config.compile.sources.join(", ")
        );
        return Ok(1);
    }

    let mut session = open_session(&project_dir, &config);
    let stale = match session.stale_sources(&sources) {
        Ok(stale) => stale,
        Err(e) => {
            // Dropping the session keeps the recorded state as it was.
            eprintln!("error: {e}");
            return Ok(1);
        }
    };

    if stale.is_empty() {
        session.finish();
        if !global.quiet {
            eprintln!("  Up to date ({} sources)", sources.len());
        }
        return Ok(0);
    }

    let planned = plan_compiles(&stale, &config.compile);

    if args.dry_run {
        for p in &planned {
            println!("{}", p.command.line());
        }
        if !global.quiet {
            eprintln!("   Would rebuild {} of {} sources", stale.len(), sources.len());
        }
        return Ok(0);
    }

    ensure_object_dirs(&project_dir, &planned)?;

    let pool = BuildPool::with_workers(args.jobs.unwrap_or_else(|| config.build.worker_limit()));
    if !global.quiet {
        eprintln!(
            "   Compiling {} of {} sources ({} workers)",
            stale.len(),
            sources.len(),
            pool.worker_count(stale.len())
        );
    }

    let executor = ShellExecutor {
        echo: !global.quiet,
        cwd: Some(project_dir.clone()),
    };
    let commands = planned.into_iter().map(|p| p.command).collect();
    let report = pool.run(commands, &executor);

    session.record_failures(&report);
    session.finish();

    if report.is_success() {
        if !global.quiet {
            eprintln!("    Finished {} sources", report.len());
        }
        Ok(0)
    } else {
        report_failures(&report);
        Ok(1)
    }
}

fn report_failures(report: &BatchReport) {
    for failed in report.failures() {
        let what = failed
            .command
            .source()
            .map(|s| s.to_string())
            .unwrap_or_else(|| failed.command.line().to_string());
        match &failed.outcome {
            kiln_engine::Outcome::Failed { code: Some(code) } => {
                eprintln!("error: failed to build {what} (exit code {code})")
            }
            kiln_engine::Outcome::Failed { code: None } => {
                eprintln!("error: failed to build {what} (terminated by signal)")
            }
            kiln_engine::Outcome::SpawnError(e) => {
                eprintln!("error: could not run command for {what}: {e}")
            }
            kiln_engine::Outcome::Success => {}
        }
    }
    eprintln!("error: {} of {} commands failed", report.failures().count(), report.len());
}
