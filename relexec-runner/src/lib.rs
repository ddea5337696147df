//! Execution core for release-engineering scripts. Every operation that
//! touches state outside the script (process invocation, filesystem
//! mutation, console output) goes through a swappable [`Backend`], so the
//! same orchestration code can run for real, as a dry run that only reports
//! mutations, or against a recording test double.

pub mod backend;
pub mod command;
pub mod console;
pub mod environment;
pub mod error;
pub mod runner;
pub mod tracker;

#[cfg(feature = "std-process")]
pub use backend::ProcessBackend;
pub use backend::{
    Backend, Chunk, DryRunBackend, FileChunks, Invocation, RecordedCall, RecordingBackend,
    ScriptedResponse,
};
pub use command::{Command, Platform, ShellOptions};
pub use console::{ConsoleSink, MemoryConsole, StdoutConsole};
pub use environment::EnvMap;
pub use error::{CommandError, ExecError, Result};
pub use runner::{CommandRunner, RunOptions};
pub use tracker::DirectoryTracker;
