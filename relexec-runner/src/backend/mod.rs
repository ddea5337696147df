//! Swappable side-effect layer.
//!
//! Every primitive that touches state outside the script goes through a
//! [`Backend`]: process execution, filesystem mutation, file reads and the
//! console. [`ProcessBackend`] does the work for real, [`DryRunBackend`] only
//! reports intended mutations, and [`RecordingBackend`] records calls for
//! tests.

mod dry_run;
#[cfg(feature = "std-process")]
mod process;
mod recording;

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

pub use dry_run::DryRunBackend;
#[cfg(feature = "std-process")]
pub use process::ProcessBackend;
pub use recording::{RecordedCall, RecordingBackend, ScriptedResponse};

use crate::command::{Command, ShellOptions};
use crate::console::ConsoleSink;
use crate::environment::EnvMap;
use crate::error::{ExecError, Result};

/// Block size used when reading files in binary mode.
pub const READ_BLOCK_SIZE: usize = 4096;

/// A fully prepared command handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    /// Working directory; `None` inherits the process directory.
    pub cwd: Option<PathBuf>,
    /// Complete child environment; `None` inherits the process environment.
    pub env: Option<EnvMap>,
    pub shell: ShellOptions,
}

impl Invocation {
    pub fn new(command: impl Into<Command>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: None,
            shell: ShellOptions::default(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, env: EnvMap) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_shell(mut self, shell: ShellOptions) -> Self {
        self.shell = shell;
        self
    }
}

/// Contract shared by the real, dry-run and recording backends.
pub trait Backend: Send + Sync {
    /// Sink for progress and echo lines.
    fn console(&self) -> &dyn ConsoleSink;

    /// Runs to completion and returns the exit code.
    fn run(&self, invocation: &Invocation) -> Result<i32>;

    /// Like [`run`](Self::run), but a non-zero exit is
    /// [`ExecError::ProcessFailed`].
    fn run_checked(&self, invocation: &Invocation) -> Result<()> {
        match self.run(invocation)? {
            0 => Ok(()),
            code => Err(ExecError::ProcessFailed { code }),
        }
    }

    /// Runs to completion and returns captured standard output. Bytes that
    /// are not valid UTF-8 are replaced with U+FFFD.
    fn run_captured(&self, invocation: &Invocation) -> Result<String>;

    /// Starts the command without waiting for it. Returns the child pid when
    /// a process was actually started.
    fn spawn(&self, invocation: &Invocation) -> Result<Option<u32>>;

    /// Removes a file, or a directory tree, at `path`. Missing paths are fine.
    fn delete_path(&self, path: &Path) -> Result<()>;

    /// Creates `path` and its parents. With `empty_required`, existing
    /// content is deleted first.
    fn ensure_directory(&self, path: &Path, empty_required: bool) -> Result<()>;

    /// Lazily reads `path` as text lines or, with `binary`, fixed-size blocks.
    /// Each call reopens the file.
    fn read_chunks(&self, path: &Path, binary: bool) -> Result<FileChunks>;

    /// Overwrites `path` with `contents`.
    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    /// Ends the process with `code`. Test doubles record the code and return.
    fn terminate(&self, code: i32);
}

/// One item produced by [`FileChunks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// A text line, including its terminator when present.
    Line(String),
    /// Up to [`READ_BLOCK_SIZE`] bytes.
    Block(Vec<u8>),
}

/// Lazy chunked reader over a single file.
#[derive(Debug)]
pub struct FileChunks {
    path: PathBuf,
    reader: BufReader<File>,
    binary: bool,
    finished: bool,
}

impl FileChunks {
    pub fn open(path: impl Into<PathBuf>, binary: bool) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ExecError::io("opening", &path, source))?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            binary,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_block(&mut self) -> std::io::Result<Option<Chunk>> {
        let mut block = Vec::with_capacity(READ_BLOCK_SIZE);
        (&mut self.reader)
            .take(READ_BLOCK_SIZE as u64)
            .read_to_end(&mut block)?;
        Ok((!block.is_empty()).then_some(Chunk::Block(block)))
    }

    fn next_line(&mut self) -> std::io::Result<Option<Chunk>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line)?;
        Ok((read > 0).then_some(Chunk::Line(line)))
    }
}

impl Iterator for FileChunks {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let next = if self.binary {
            self.next_block()
        } else {
            self.next_line()
        };

        match next {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(source) => {
                self.finished = true;
                Some(Err(ExecError::io("reading", &self.path, source)))
            }
        }
    }
}
