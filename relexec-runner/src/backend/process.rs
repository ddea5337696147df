use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{self, Child, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;

use super::{Backend, FileChunks, Invocation};
use crate::command::Command;
use crate::console::{ConsoleSink, StdoutConsole};
use crate::error::{ExecError, Result};
use crate::tracker::DirectoryTracker;

/// Executes commands through [`std::process::Command`] and performs
/// filesystem operations for real.
pub struct ProcessBackend {
    tracker: DirectoryTracker,
    console: Arc<dyn ConsoleSink>,
}

impl ProcessBackend {
    pub fn new(tracker: DirectoryTracker) -> Self {
        Self::with_console(tracker, Arc::new(StdoutConsole))
    }

    pub fn with_console(tracker: DirectoryTracker, console: Arc<dyn ConsoleSink>) -> Self {
        Self { tracker, console }
    }

    fn build(&self, invocation: &Invocation) -> Result<(process::Command, String)> {
        let (mut cmd, program) = match &invocation.command {
            Command::Argv(args) => {
                let Some((program, rest)) = args.split_first() else {
                    return Err(ExecError::InvalidArgument(
                        "cannot run an empty argument list".to_string(),
                    ));
                };
                let mut cmd = process::Command::new(program);
                cmd.args(rest);
                (cmd, program.clone())
            }
            Command::Shell(script) => {
                let (shell, flag): (OsString, &str) = match &invocation.shell.executable {
                    Some(executable) => (executable.clone().into_os_string(), "-c"),
                    None if cfg!(windows) => ("cmd".into(), "/C"),
                    None => ("/bin/sh".into(), "-c"),
                };
                let program = shell.to_string_lossy().into_owned();
                let mut cmd = process::Command::new(shell);
                cmd.arg(flag).arg(script);
                (cmd, program)
            }
        };

        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(env) = &invocation.env {
            cmd.env_clear();
            cmd.envs(env);
        }

        Ok((cmd, program))
    }
}

impl Backend for ProcessBackend {
    fn console(&self) -> &dyn ConsoleSink {
        self.console.as_ref()
    }

    fn run(&self, invocation: &Invocation) -> Result<i32> {
        let (mut cmd, program) = self.build(invocation)?;
        self.console.flush();
        let status = cmd
            .status()
            .map_err(|source| ExecError::Spawn { program, source })?;
        Ok(exit_code(status))
    }

    fn run_captured(&self, invocation: &Invocation) -> Result<String> {
        let (mut cmd, program) = self.build(invocation)?;
        self.console.flush();
        let output = cmd
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| ExecError::Spawn { program, source })?;

        if !output.status.success() {
            return Err(ExecError::ProcessFailed {
                code: exit_code(output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn spawn(&self, invocation: &Invocation) -> Result<Option<u32>> {
        let (mut cmd, program) = self.build(invocation)?;
        self.console.flush();
        let child = cmd
            .spawn()
            .map_err(|source| ExecError::Spawn { program, source })?;
        let pid = child.id();
        tracing::debug!(pid, "started detached process");
        reap_in_background(child);
        Ok(Some(pid))
    }

    fn delete_path(&self, path: &Path) -> Result<()> {
        let path = self.tracker.resolve(path);
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            match fs::symlink_metadata(&path) {
                Ok(_) => fs::remove_file(&path),
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
                Err(err) => Err(err),
            }
        };
        removed.map_err(|source| ExecError::io("deleting", path, source))
    }

    fn ensure_directory(&self, path: &Path, empty_required: bool) -> Result<()> {
        let path = self.tracker.resolve(path);
        if empty_required {
            self.delete_path(&path)?;
        } else if path.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&path).map_err(|source| ExecError::io("creating", path, source))
    }

    fn read_chunks(&self, path: &Path, binary: bool) -> Result<FileChunks> {
        FileChunks::open(self.tracker.resolve(path), binary)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        let path = self.tracker.resolve(path);
        fs::write(&path, contents).map_err(|source| ExecError::io("writing", path, source))
    }

    fn terminate(&self, code: i32) {
        self.console.flush();
        process::exit(code);
    }
}

/// Waits for a detached child on its own thread so it never lingers as a
/// zombie.
fn reap_in_background(mut child: Child) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name(format!("relexec-reaper-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => {
                tracing::debug!(pid, code = exit_code(status), "detached process exited")
            }
            Err(error) => tracing::warn!(pid, %error, "failed to wait for detached process"),
        });
    if let Err(error) = spawned {
        tracing::warn!(pid, %error, "failed to start reaper thread");
    }
}

/// Exit code of a finished child. On Unix a signal-terminated child reports
/// the negated signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}
