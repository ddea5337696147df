use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Backend, FileChunks, Invocation};
use crate::console::{ConsoleSink, MemoryConsole};
use crate::error::{ExecError, Result};
use crate::tracker::DirectoryTracker;

/// A call observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Run(Invocation),
    RunCaptured(Invocation),
    Spawn(Invocation),
    DeletePath(PathBuf),
    EnsureDirectory { path: PathBuf, empty_required: bool },
    ReadChunks { path: PathBuf, binary: bool },
    WriteFile { path: PathBuf, contents: String },
    Terminate(i32),
}

/// Result handed back for the next execution call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedResponse {
    pub exit_code: i32,
    pub stdout: String,
}

/// Test double that records every call without side effects.
///
/// Execution calls consume scripted responses in order; once the script runs
/// out they succeed with empty output. Reads go to the real filesystem.
pub struct RecordingBackend {
    tracker: DirectoryTracker,
    console: MemoryConsole,
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<VecDeque<ScriptedResponse>>,
}

impl RecordingBackend {
    pub fn new(tracker: DirectoryTracker) -> Self {
        Self {
            tracker,
            console: MemoryConsole::new(),
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_response(&self, exit_code: i32, stdout: impl Into<String>) {
        self.responses.lock().push_back(ScriptedResponse {
            exit_code,
            stdout: stdout.into(),
        });
    }

    pub fn push_exit_code(&self, exit_code: i32) {
        self.push_response(exit_code, String::new());
    }

    pub fn push_output(&self, stdout: impl Into<String>) {
        self.push_response(0, stdout);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Invocations from every execution call, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Run(invocation)
                | RecordedCall::RunCaptured(invocation)
                | RecordedCall::Spawn(invocation) => Some(invocation.clone()),
                _ => None,
            })
            .collect()
    }

    /// Shared handle to the captured console lines.
    pub fn console_handle(&self) -> MemoryConsole {
        self.console.clone()
    }

    pub fn terminated_with(&self) -> Option<i32> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            RecordedCall::Terminate(code) => Some(*code),
            _ => None,
        })
    }

    /// Convenience for sharing one recorder between a runner and a test.
    pub fn shared(tracker: DirectoryTracker) -> Arc<Self> {
        Arc::new(Self::new(tracker))
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().push(call);
    }

    fn next_response(&self) -> ScriptedResponse {
        self.responses.lock().pop_front().unwrap_or_default()
    }
}

impl Backend for RecordingBackend {
    fn console(&self) -> &dyn ConsoleSink {
        &self.console
    }

    fn run(&self, invocation: &Invocation) -> Result<i32> {
        self.record(RecordedCall::Run(invocation.clone()));
        Ok(self.next_response().exit_code)
    }

    fn run_captured(&self, invocation: &Invocation) -> Result<String> {
        self.record(RecordedCall::RunCaptured(invocation.clone()));
        let response = self.next_response();
        if response.exit_code != 0 {
            return Err(ExecError::ProcessFailed {
                code: response.exit_code,
            });
        }
        Ok(response.stdout)
    }

    fn spawn(&self, invocation: &Invocation) -> Result<Option<u32>> {
        self.record(RecordedCall::Spawn(invocation.clone()));
        Ok(None)
    }

    fn delete_path(&self, path: &Path) -> Result<()> {
        self.record(RecordedCall::DeletePath(path.to_path_buf()));
        Ok(())
    }

    fn ensure_directory(&self, path: &Path, empty_required: bool) -> Result<()> {
        self.record(RecordedCall::EnsureDirectory {
            path: path.to_path_buf(),
            empty_required,
        });
        Ok(())
    }

    fn read_chunks(&self, path: &Path, binary: bool) -> Result<FileChunks> {
        self.record(RecordedCall::ReadChunks {
            path: path.to_path_buf(),
            binary,
        });
        FileChunks::open(self.tracker.resolve(path), binary)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        self.record(RecordedCall::WriteFile {
            path: path.to_path_buf(),
            contents: contents.to_string(),
        });
        Ok(())
    }

    fn terminate(&self, code: i32) {
        self.record(RecordedCall::Terminate(code));
    }
}
