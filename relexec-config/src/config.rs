use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Effective configuration for assembling a runner stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelexecConfig {
    pub execution: ExecutionConfig,
    pub shell: ShellConfig,
    pub environment: EnvironmentConfig,
    pub logging: LoggingConfig,
}

impl RelexecConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(executable) = &self.shell.executable {
            if !executable.is_absolute() {
                bail!(
                    "shell.executable must be an absolute path, got `{}`",
                    executable.display()
                );
            }
        }

        for name in self.environment.set.keys() {
            if name.is_empty() || name.contains('=') {
                bail!("environment.set contains an invalid variable name `{name}`");
            }
        }

        if self.logging.level.trim().is_empty() {
            bail!("logging.level must not be empty");
        }

        Ok(())
    }

    pub fn is_dry_run(&self) -> bool {
        self.execution.mode == ExecutionMode::DryRun
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Execute commands and mutate the filesystem.
    #[default]
    Real,
    /// Report intended mutations; reads still happen.
    DryRun,
}

/// Which quoting and shell rules runners follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformSetting {
    /// Follow the host.
    #[default]
    Auto,
    Windows,
    Unix,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub platform: PlatformSetting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell forced for shell-string commands on non-Windows platforms.
    /// Unset keeps the runner default (`/bin/bash`).
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Seed the environment snapshot from the process environment.
    pub inherit: bool,

    /// Variables applied on top of the snapshot.
    pub set: BTreeMap<String, String>,

    /// Entries prepended to `PATH`, first entry ends up first.
    pub prepend_path: Vec<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            inherit: true,
            set: BTreeMap::new(),
            prepend_path: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
