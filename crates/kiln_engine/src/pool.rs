//! Bounded parallel execution of independent build commands.
//!
//! Commands are pushed onto one shared FIFO queue and a fixed set of scoped
//! worker threads drains it. Popping is the only synchronization point, so
//! every command is claimed by exactly one worker. Commands in a batch must
//! not depend on each other: they run in no particular order.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;

use crossbeam::queue::SegQueue;
use kiln_common::SourcePath;
use tracing::{debug, info, warn};

/// One shell-level build action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    line: String,
    source: Option<SourcePath>,
}

impl Command {
    /// Creates a command that is not tied to a source file.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            source: None,
        }
    }

    /// Creates a command that rebuilds `source`.
    pub fn for_source(line: impl Into<String>, source: SourcePath) -> Self {
        Self {
            line: line.into(),
            source: Some(source),
        }
    }

    /// Returns the command line.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Returns the source file this command rebuilds, if any.
    pub fn source(&self) -> Option<&SourcePath> {
        self.source.as_ref()
    }
}

/// How a command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exited with status zero.
    Success,
    /// Exited with a non-zero status, or was killed by a signal (`code` is `None`).
    Failed {
        /// The exit code, if the process exited normally.
        code: Option<i32>,
    },
    /// The process could not be started.
    SpawnError(String),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Runs a single command to completion.
///
/// Shared by reference across all workers of a batch.
pub trait Executor: Sync {
    /// Executes `command`, blocking until it finishes.
    fn execute(&self, command: &Command) -> Outcome;
}

/// Runs commands through the platform shell with inherited console output.
#[derive(Debug, Default, Clone)]
pub struct ShellExecutor {
    /// Print each command line to stdout before running it.
    pub echo: bool,
    /// Working directory for every command; the current one when `None`.
    pub cwd: Option<PathBuf>,
}

impl Executor for ShellExecutor {
    fn execute(&self, command: &Command) -> Outcome {
        if self.echo {
            println!("{}", command.line());
        }
        let mut process = shell(command.line());
        if let Some(dir) = &self.cwd {
            process.current_dir(dir);
        }
        match process.status() {
            Ok(status) if status.success() => Outcome::Success,
            Ok(status) => Outcome::Failed {
                code: status.code(),
            },
            Err(e) => Outcome::SpawnError(e.to_string()),
        }
    }
}

#[cfg(windows)]
fn shell(line: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("cmd");
    cmd.args(["/C", line]);
    cmd
}

#[cfg(not(windows))]
fn shell(line: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("sh");
    cmd.args(["-c", line]);
    cmd
}

/// The result of one command in a batch.
#[derive(Debug, Clone)]
pub struct CommandReport {
    /// The command that ran.
    pub command: Command,
    /// How it finished.
    pub outcome: Outcome,
    /// Index of the worker that ran it.
    pub worker: usize,
}

/// The results of one [`BuildPool::run`] call, in submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One report per submitted command.
    pub reports: Vec<CommandReport>,
}

impl BatchReport {
    /// Returns `true` if every command succeeded (vacuously true when empty).
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(|r| r.outcome.is_success())
    }

    /// Returns the reports of commands that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &CommandReport> {
        self.reports.iter().filter(|r| !r.outcome.is_success())
    }

    /// Returns the number of commands in the batch.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Returns `true` if the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// A fixed-size pool of workers draining a shared command queue.
#[derive(Debug, Clone, Copy)]
pub struct BuildPool {
    max_workers: NonZeroUsize,
}

impl BuildPool {
    /// Creates a pool running at most `max_workers` commands at once.
    pub fn new(max_workers: NonZeroUsize) -> Self {
        Self { max_workers }
    }

    /// Creates a pool from a plain count, treating zero as one.
    pub fn with_workers(max_workers: usize) -> Self {
        Self::new(NonZeroUsize::new(max_workers).unwrap_or(NonZeroUsize::MIN))
    }

    /// Returns the configured worker limit.
    pub fn max_workers(&self) -> usize {
        self.max_workers.get()
    }

    /// Returns how many workers a batch of `jobs` commands starts.
    pub fn worker_count(&self, jobs: usize) -> usize {
        self.max_workers.get().min(jobs)
    }

    /// Runs every command exactly once and returns when all have finished.
    ///
    /// Starts `min(max_workers, commands.len())` workers. A failing command
    /// does not stop the others; check [`BatchReport::is_success`].
    pub fn run<E: Executor>(&self, commands: Vec<Command>, executor: &E) -> BatchReport {
        let total = commands.len();
        let workers = self.worker_count(total);
        if workers == 0 {
            return BatchReport::default();
        }

        let queue = SegQueue::new();
        for job in commands.into_iter().enumerate() {
            queue.push(job);
        }
        debug!(commands = total, workers, "starting build pool");

        let mut slots: Vec<Option<CommandReport>> = vec![None; total];
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let queue = &queue;
                    scope.spawn(move || drain(worker, queue, executor))
                })
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (index, report) in done {
                            slots[index] = Some(report);
                        }
                    }
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });

        let reports: Vec<CommandReport> = slots.into_iter().flatten().collect();
        debug_assert_eq!(reports.len(), total, "every command reports exactly once");
        BatchReport { reports }
    }
}

/// Worker loop: pop and execute until the queue is empty.
fn drain<E: Executor>(
    worker: usize,
    queue: &SegQueue<(usize, Command)>,
    executor: &E,
) -> Vec<(usize, CommandReport)> {
    let mut done = Vec::new();
    while let Some((index, command)) = queue.pop() {
        info!(worker, command = command.line(), "running");
        let outcome = executor.execute(&command);
        match &outcome {
            Outcome::Success => {}
            Outcome::Failed { code } => {
                warn!(worker, command = command.line(), ?code, "command failed")
            }
            Outcome::SpawnError(e) => {
                warn!(worker, command = command.line(), "could not start command: {e}")
            }
        }
        done.push((
            index,
            CommandReport {
                command,
                outcome,
                worker,
            },
        ));
    }
    debug!(worker, ran = done.len(), "worker finished");
    done
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl Executor for Recording {
        fn execute(&self, command: &Command) -> Outcome {
            self.seen.lock().unwrap().push(command.line().to_string());
            if command.line().starts_with("fail") {
                Outcome::Failed { code: Some(2) }
            } else {
                Outcome::Success
            }
        }
    }

    fn recording() -> Recording {
        Recording {
            seen: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn worker_count_is_bounded_by_jobs() {
        let pool = BuildPool::with_workers(4);
        assert_eq!(pool.worker_count(0), 0);
        assert_eq!(pool.worker_count(2), 2);
        assert_eq!(pool.worker_count(9), 4);
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(BuildPool::with_workers(0).max_workers(), 1);
    }

    #[test]
    fn empty_batch_starts_nothing() {
        let exec = recording();
        let report = BuildPool::with_workers(3).run(Vec::new(), &exec);
        assert!(report.is_empty());
        assert!(report.is_success());
        assert!(exec.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn reports_follow_submission_order() {
        let exec = recording();
        let commands: Vec<Command> = (0..20).map(|i| Command::new(format!("cmd {i}"))).collect();
        let report = BuildPool::with_workers(4).run(commands, &exec);
        let lines: Vec<&str> = report.reports.iter().map(|r| r.command.line()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("cmd {i}")).collect();
        assert_eq!(lines, expected);
        assert!(report.reports.iter().all(|r| r.worker < 4));
    }

    #[test]
    fn failure_does_not_cancel_siblings() {
        let exec = recording();
        let commands = vec![
            Command::new("ok 1"),
            Command::new("fail 2"),
            Command::new("ok 3"),
            Command::new("ok 4"),
        ];
        let report = BuildPool::with_workers(2).run(commands, &exec);
        assert_eq!(exec.seen.lock().unwrap().len(), 4);
        assert!(!report.is_success());
        let failed: Vec<&str> = report.failures().map(|r| r.command.line()).collect();
        assert_eq!(failed, vec!["fail 2"]);
    }

    #[test]
    fn single_worker_runs_fifo() {
        let exec = recording();
        let commands: Vec<Command> = (0..5).map(|i| Command::new(format!("step {i}"))).collect();
        BuildPool::with_workers(1).run(commands, &exec);
        let seen = exec.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["step 0", "step 1", "step 2", "step 3", "step 4"]);
    }

    #[test]
    fn command_keeps_its_source() {
        let src = SourcePath::new("src/a.c").unwrap();
        let cmd = Command::for_source("cc -c src/a.c", src.clone());
        assert_eq!(cmd.source(), Some(&src));
        assert!(Command::new("true").source().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_reports_exit_status() {
        let exec = ShellExecutor::default();
        assert_eq!(exec.execute(&Command::new("true")), Outcome::Success);
        assert_eq!(
            exec.execute(&Command::new("exit 3")),
            Outcome::Failed { code: Some(3) }
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_honors_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exec = ShellExecutor {
            echo: false,
            cwd: Some(dir.path().to_path_buf()),
        };
        assert!(exec.execute(&Command::new("touch marker")).is_success());
        assert!(dir.path().join("marker").exists());
    }
}
