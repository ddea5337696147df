use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the execution core.
pub type Result<T, E = ExecError> = std::result::Result<T, E>;

/// Failure of one of the checked [`CommandRunner`](crate::CommandRunner)
/// entry points.
///
/// The message is the rendered, shell-safe form of the command and nothing
/// else, so it can be printed or pasted back into a shell as-is. Callers that
/// need the exit code should use the unchecked `run` and inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{command}")]
pub struct CommandError {
    command: String,
}

impl CommandError {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The rendered command string that failed.
    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Errors produced by backends, the directory tracker and the command runner.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A precondition on an input was violated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A spawned process exited with a non-zero status.
    ///
    /// On Unix a child killed by a signal reports the negated signal number.
    #[error("process exited with status {code}")]
    ProcessFailed { code: i32 },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while {action} '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Returns the exit code when this is a process failure.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ProcessFailed { code } => Some(*code),
            _ => None,
        }
    }
}
