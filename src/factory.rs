//! Assembles the shared runner stack from a [`RelexecConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use relexec_config::{EnvironmentConfig, ExecutionMode, PlatformSetting, RelexecConfig};
use relexec_runner::environment::{self, snapshot_process_env};
use relexec_runner::{
    Backend, CommandRunner, DirectoryTracker, DryRunBackend, EnvMap, Platform, ShellOptions,
};

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

/// Owns the pieces every runner of one script shares: the directory
/// tracker, the backend, the platform tag and the environment snapshot.
pub struct ExecutorFactory {
    tracker: DirectoryTracker,
    env: EnvMap,
    platform: Platform,
    shell: ShellOptions,
    backend: Arc<dyn Backend>,
}

impl ExecutorFactory {
    /// Builds the stack rooted at the process working directory.
    pub fn from_config(config: &RelexecConfig) -> Result<Self> {
        let tracker =
            DirectoryTracker::new().context("Failed to resolve the initial working directory")?;
        Ok(Self::from_config_in(config, tracker))
    }

    /// Builds the stack around an existing tracker.
    pub fn from_config_in(config: &RelexecConfig, tracker: DirectoryTracker) -> Self {
        let platform = resolve_platform(config.execution.platform);
        let backend: Arc<dyn Backend> = match config.execution.mode {
            ExecutionMode::Real => Arc::new(relexec_runner::ProcessBackend::new(tracker.clone())),
            ExecutionMode::DryRun => Arc::new(DryRunBackend::new(tracker.clone())),
        };

        let mut shell = ShellOptions::for_platform(platform);
        if let Some(executable) = &config.shell.executable {
            if !platform.is_windows() {
                shell = shell.with_executable(executable.clone());
            }
        }

        tracing::debug!(
            mode = ?config.execution.mode,
            ?platform,
            cwd = %tracker.current().display(),
            "assembled executor stack"
        );

        Self {
            tracker,
            env: environment_snapshot(&config.environment),
            platform,
            shell,
            backend,
        }
    }

    /// Wires an arbitrary backend, typically a recording double.
    pub fn with_backend(
        tracker: DirectoryTracker,
        env: EnvMap,
        platform: Platform,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            tracker,
            env,
            platform,
            shell: ShellOptions::for_platform(platform),
            backend,
        }
    }

    pub fn with_shell_options(mut self, shell: ShellOptions) -> Self {
        self.shell = shell;
        self
    }

    /// A new runner with its own copy of the environment snapshot.
    pub fn command_runner(&self) -> CommandRunner {
        CommandRunner::new(
            self.tracker.clone(),
            &self.env,
            self.platform,
            Arc::clone(&self.backend),
        )
        .with_shell_options(self.shell.clone())
    }

    pub fn tracker(&self) -> &DirectoryTracker {
        &self.tracker
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn environment(&self) -> &EnvMap {
        &self.env
    }
}

pub fn resolve_platform(setting: PlatformSetting) -> Platform {
    match setting {
        PlatformSetting::Auto => Platform::host(),
        PlatformSetting::Windows => Platform::Windows,
        PlatformSetting::Unix => Platform::Unix,
    }
}

/// Seeds the snapshot from the process environment when `inherit` is set,
/// applies `set`, then prepends `prepend_path` to `PATH` so its first entry
/// ends up first.
pub fn environment_snapshot(config: &EnvironmentConfig) -> EnvMap {
    let mut env = if config.inherit {
        snapshot_process_env()
    } else {
        EnvMap::new()
    };

    for (name, value) in &config.set {
        environment::set_var(&mut env, name, Some(value));
    }
    for entry in config.prepend_path.iter().rev() {
        environment::prepend_var(&mut env, "PATH", entry, PATH_LIST_SEPARATOR);
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn explicit_platform_settings_win_over_host() {
        assert_eq!(resolve_platform(PlatformSetting::Windows), Platform::Windows);
        assert_eq!(resolve_platform(PlatformSetting::Unix), Platform::Unix);
        assert_eq!(resolve_platform(PlatformSetting::Auto), Platform::host());
    }

    #[test]
    fn snapshot_without_inheritance_only_holds_configured_values() {
        let mut config = EnvironmentConfig {
            inherit: false,
            ..Default::default()
        };
        config.set.insert("PATH".into(), "base".into());
        config.set.insert("CC".into(), "clang".into());
        config.prepend_path = vec!["first".into(), "second".into()];

        let env = environment_snapshot(&config);
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("CC").map(String::as_str), Some("clang"));
        let expected = ["first", "second", "base"].join(PATH_LIST_SEPARATOR);
        assert_eq!(env.get("PATH"), Some(&expected));
    }

    #[test]
    fn prepend_path_creates_missing_path() {
        let config = EnvironmentConfig {
            inherit: false,
            prepend_path: vec!["/opt/tools/bin".into()],
            ..Default::default()
        };
        let env = environment_snapshot(&config);
        assert_eq!(env.get("PATH").map(String::as_str), Some("/opt/tools/bin"));
    }
}
