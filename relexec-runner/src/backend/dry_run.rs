use std::path::Path;
use std::sync::Arc;

use super::{Backend, FileChunks, Invocation};
use crate::console::{ConsoleSink, StdoutConsole};
use crate::error::Result;
use crate::tracker::DirectoryTracker;

/// Backend for manual dry runs: reads are real, while executions, deletions
/// and writes are only reported.
pub struct DryRunBackend {
    tracker: DirectoryTracker,
    console: Arc<dyn ConsoleSink>,
}

impl DryRunBackend {
    pub fn new(tracker: DirectoryTracker) -> Self {
        Self::with_console(tracker, Arc::new(StdoutConsole))
    }

    pub fn with_console(tracker: DirectoryTracker, console: Arc<dyn ConsoleSink>) -> Self {
        Self { tracker, console }
    }
}

impl Backend for DryRunBackend {
    fn console(&self) -> &dyn ConsoleSink {
        self.console.as_ref()
    }

    fn run(&self, invocation: &Invocation) -> Result<i32> {
        tracing::debug!(command = ?invocation.command, "dry run: skipping execution");
        Ok(0)
    }

    fn run_captured(&self, invocation: &Invocation) -> Result<String> {
        tracing::debug!(command = ?invocation.command, "dry run: skipping captured execution");
        Ok(String::new())
    }

    fn spawn(&self, invocation: &Invocation) -> Result<Option<u32>> {
        tracing::debug!(command = ?invocation.command, "dry run: skipping spawn");
        Ok(None)
    }

    fn delete_path(&self, path: &Path) -> Result<()> {
        self.console.write_line(&format!("delete: {}", path.display()));
        Ok(())
    }

    fn ensure_directory(&self, path: &Path, empty_required: bool) -> Result<()> {
        tracing::debug!(
            path = %path.display(),
            empty_required,
            "dry run: skipping directory creation"
        );
        Ok(())
    }

    fn read_chunks(&self, path: &Path, binary: bool) -> Result<FileChunks> {
        FileChunks::open(self.tracker.resolve(path), binary)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        self.console.write_line(&format!("write: {} <<<", path.display()));
        self.console.write_line(&format!("{contents}<<<"));
        Ok(())
    }

    fn terminate(&self, code: i32) {
        self.console.flush();
        std::process::exit(code);
    }
}
