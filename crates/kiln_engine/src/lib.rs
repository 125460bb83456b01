//! Staleness resolution and parallel command execution.
//!
//! [`StalenessResolver`] walks the include graph to decide which sources need
//! rebuilding, [`BuildPool`] runs the resulting commands on a bounded set of
//! workers, and [`BuildSession`] ties both to the persisted build state for
//! one run.

#![warn(missing_docs)]

pub mod error;
pub mod pool;
pub mod resolver;
pub mod session;

pub use error::EngineError;
pub use pool::{BatchReport, BuildPool, Command, CommandReport, Executor, Outcome, ShellExecutor};
pub use resolver::StalenessResolver;
pub use session::BuildSession;
