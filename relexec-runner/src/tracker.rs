//! Logical working directory shared by runners and backends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use path_clean::PathClean;

use crate::error::{ExecError, Result};

/// Tracks the "current directory" used for command execution without ever
/// touching the process' real working directory.
///
/// Clones share the same underlying state: a [`change`](Self::change) made
/// through one handle is immediately visible through every other handle.
/// Construct a fresh tracker per test to keep cases isolated.
#[derive(Debug, Clone)]
pub struct DirectoryTracker {
    cwd: Arc<RwLock<PathBuf>>,
}

impl DirectoryTracker {
    /// Starts tracking from the process' actual working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|source| ExecError::io("reading current directory", ".", source))?;
        Self::with_path(cwd)
    }

    /// Starts tracking from an explicit absolute path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = ensure_absolute(path.into())?;
        Ok(Self {
            cwd: Arc::new(RwLock::new(path)),
        })
    }

    pub fn current(&self) -> PathBuf {
        self.cwd.read().clone()
    }

    /// Replaces the tracked directory. The target must be absolute; it is not
    /// required to exist.
    pub fn change(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = ensure_absolute(path.into())?;
        tracing::debug!(cwd = %path.display(), "changing tracked directory");
        *self.cwd.write() = path;
        Ok(())
    }

    /// Resolves `path` against the tracked directory when it is relative.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.read().join(path).clean()
        }
    }
}

fn ensure_absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Err(ExecError::InvalidArgument(format!(
            "directory `{}` is not an absolute path",
            path.display()
        )))
    }
}
