use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Line-oriented sink for human-readable progress and echo output.
///
/// One message per call; implementations append the trailing newline.
pub trait ConsoleSink: Send + Sync {
    fn write_line(&self, line: &str);

    /// Flush buffered output before handing the terminal to a child process.
    fn flush(&self) {}
}

/// Writes every line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl ConsoleSink for StdoutConsole {
    fn write_line(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(error) = writeln!(stdout, "{line}") {
            tracing::warn!(%error, "failed to write console line");
        }
    }

    fn flush(&self) {
        if let Err(error) = io::stdout().flush() {
            tracing::warn!(%error, "failed to flush console");
        }
    }
}

/// Keeps lines in memory. Clones share the same buffer, so a test can hand
/// one clone to a backend and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct MemoryConsole {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl ConsoleSink for MemoryConsole {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
