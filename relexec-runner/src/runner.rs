//! The command-execution core.
//!
//! A [`CommandRunner`] renders each command for display, echoes it to the
//! backend console as `+ <command>`, fills in the tracked working directory
//! and its own environment, and hands the prepared [`Invocation`] to the
//! backend. A non-zero exit from a checked entry point comes back as a
//! [`CommandError`] carrying only the rendered command.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{Backend, Invocation};
use crate::command::{Command, Platform, ShellOptions};
use crate::environment::{self, DumpLine, EnvMap, DEFAULT_SEPARATOR, ENVIRONMENT_DUMP_ARGS};
use crate::error::{CommandError, ExecError, Result};
use crate::tracker::DirectoryTracker;

/// Per-call overrides. Unset fields fall back to the runner's state.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    cwd: Option<PathBuf>,
    env: Option<EnvMap>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working directory for this call. Relative paths resolve against the
    /// tracked directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Complete environment for this call, replacing the runner's mapping.
    pub fn env(mut self, env: EnvMap) -> Self {
        self.env = Some(env);
        self
    }
}

pub struct CommandRunner {
    tracker: DirectoryTracker,
    env: EnvMap,
    platform: Platform,
    shell: ShellOptions,
    backend: Arc<dyn Backend>,
}

impl CommandRunner {
    /// Builds a runner that owns a copy of `env`; later changes through the
    /// runner never reach the snapshot it came from.
    pub fn new(
        tracker: DirectoryTracker,
        env: &EnvMap,
        platform: Platform,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            tracker,
            env: env.clone(),
            platform,
            shell: ShellOptions::for_platform(platform),
            backend,
        }
    }

    /// Overrides the shell options. Ignored on Windows, which never forces a
    /// shell.
    pub fn with_shell_options(mut self, shell: ShellOptions) -> Self {
        if !self.platform.is_windows() {
            self.shell = shell;
        }
        self
    }

    pub fn tracker(&self) -> &DirectoryTracker {
        &self.tracker
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn shell_options(&self) -> &ShellOptions {
        &self.shell
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn env(&self) -> &EnvMap {
        &self.env
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Sets `name` unless `value` is `None`.
    pub fn set_var(&mut self, name: &str, value: Option<&str>) {
        environment::set_var(&mut self.env, name, value);
    }

    /// Appends `value` separated by a single space.
    pub fn append_var(&mut self, name: &str, value: &str) {
        self.append_var_with(name, value, DEFAULT_SEPARATOR);
    }

    pub fn append_var_with(&mut self, name: &str, value: &str, separator: &str) {
        environment::append_var(&mut self.env, name, value, separator);
    }

    /// Prepends `value` separated by a single space.
    pub fn prepend_var(&mut self, name: &str, value: &str) {
        self.prepend_var_with(name, value, DEFAULT_SEPARATOR);
    }

    pub fn prepend_var_with(&mut self, name: &str, value: &str, separator: &str) {
        environment::prepend_var(&mut self.env, name, value, separator);
    }

    /// Absorbs the environment produced by a toolchain setup step.
    ///
    /// Runs `<setup> && <tool> -E environment` as a shell command, sets every
    /// `NAME=value` line of its output (overwriting), and echoes all other
    /// lines to the console.
    pub fn import_environment(&mut self, setup_command: &str, tool_command: &str) -> Result<()> {
        let command = Command::shell(format!(
            "{setup_command} && {tool_command} {ENVIRONMENT_DUMP_ARGS}"
        ));
        let output = self.run_captured(command, RunOptions::default())?;

        let mut imported = 0usize;
        for line in environment::parse_environment_dump(&output) {
            match line {
                DumpLine::Assignment { name, value } => {
                    self.env.insert(name, value);
                    imported += 1;
                }
                DumpLine::Output(text) => self.backend.console().write_line(&text),
            }
        }
        tracing::debug!(imported, "imported environment variables");
        Ok(())
    }

    /// Runs the command and returns its exit code. A non-zero exit is not an
    /// error here.
    pub fn run(&self, command: impl Into<Command>, options: RunOptions) -> Result<i32> {
        let (rendered, invocation) = self.prepare(command.into(), options);
        self.backend
            .run(&invocation)
            .map_err(|err| into_command_error(err, &rendered))
    }

    /// Runs the command and fails with [`CommandError`] on a non-zero exit.
    pub fn check_run(&self, command: impl Into<Command>, options: RunOptions) -> Result<()> {
        let (rendered, invocation) = self.prepare(command.into(), options);
        self.backend
            .run_checked(&invocation)
            .map_err(|err| into_command_error(err, &rendered))
    }

    /// Runs the command and returns its standard output, failing with
    /// [`CommandError`] on a non-zero exit.
    pub fn run_captured(&self, command: impl Into<Command>, options: RunOptions) -> Result<String> {
        let (rendered, invocation) = self.prepare(command.into(), options);
        self.backend
            .run_captured(&invocation)
            .map_err(|err| into_command_error(err, &rendered))
    }

    /// Looks up `name` in the `PATH` of this runner's own environment.
    pub fn find_executable(&self, name: &str) -> Option<PathBuf> {
        let search_path = self.env.get("PATH")?;
        which::which_in(name, Some(search_path), self.tracker.current()).ok()
    }

    fn prepare(&self, command: Command, options: RunOptions) -> (String, Invocation) {
        let rendered = command.display_string(self.platform);
        let console = self.backend.console();
        console.write_line(&format!("+ {rendered}"));
        console.flush();

        let cwd = match options.cwd {
            Some(cwd) => self.tracker.resolve(&cwd),
            None => self.tracker.current(),
        };
        let shell = if command.is_shell() {
            self.shell.clone()
        } else {
            ShellOptions::default()
        };
        tracing::debug!(
            command = %rendered,
            cwd = %cwd.display(),
            shell = command.is_shell(),
            "dispatching command"
        );

        let invocation = Invocation {
            command,
            cwd: Some(cwd),
            env: Some(options.env.unwrap_or_else(|| self.env.clone())),
            shell,
        };
        (rendered, invocation)
    }
}

fn into_command_error(err: ExecError, rendered: &str) -> ExecError {
    match err {
        ExecError::ProcessFailed { code } => {
            tracing::debug!(code, command = rendered, "command failed");
            CommandError::new(rendered).into()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RecordedCall, RecordingBackend};
    use pretty_assertions::assert_eq;

    fn env_of(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    fn recording_runner(
        platform: Platform,
        env: &EnvMap,
    ) -> (CommandRunner, Arc<RecordingBackend>) {
        let tracker = DirectoryTracker::with_path(std::env::temp_dir()).unwrap();
        let backend = RecordingBackend::shared(tracker.clone());
        let runner = CommandRunner::new(tracker, env, platform, backend.clone());
        (runner, backend)
    }

    #[test]
    fn environment_is_copied_not_aliased() {
        let snapshot = env_of(&[("PATH", "/usr/bin")]);
        let (mut runner, _) = recording_runner(Platform::Unix, &snapshot);
        runner.set_var("CC", Some("clang"));
        runner.append_var_with("PATH", "/opt/bin", ":");

        assert_eq!(snapshot, env_of(&[("PATH", "/usr/bin")]));
        assert_eq!(runner.var("PATH"), Some("/usr/bin:/opt/bin"));
        assert_eq!(runner.var("CC"), Some("clang"));
    }

    #[test]
    fn set_var_with_none_changes_nothing() {
        let (mut runner, _) = recording_runner(Platform::Unix, &env_of(&[("CXX", "g++")]));
        runner.set_var("CC", None);
        runner.set_var("CXX", None);
        assert_eq!(runner.var("CC"), None);
        assert_eq!(runner.var("CXX"), Some("g++"));
    }

    #[test]
    fn append_and_prepend_default_to_space() {
        let (mut runner, _) = recording_runner(Platform::Unix, &EnvMap::new());
        runner.append_var("PATH", "/x");
        assert_eq!(runner.var("PATH"), Some("/x"));
        runner.set_var("PATH", Some("/a"));
        runner.append_var("PATH", "/x");
        assert_eq!(runner.var("PATH"), Some("/a /x"));
        runner.prepend_var("PATH", "/first");
        assert_eq!(runner.var("PATH"), Some("/first /a /x"));
    }

    #[test]
    fn run_fills_cwd_and_env_and_echoes() {
        let env = env_of(&[("PATH", "/usr/bin")]);
        let (runner, backend) = recording_runner(Platform::Unix, &env);

        assert_eq!(runner.run(["echo", "a b"], RunOptions::new()).unwrap(), 0);

        let invocation = backend.invocations().remove(0);
        assert_eq!(invocation.cwd, Some(std::env::temp_dir()));
        assert_eq!(invocation.env, Some(env));
        assert!(invocation.shell.is_empty());
        assert_eq!(backend.console_handle().lines(), vec!["+ echo 'a b'"]);
    }

    #[test]
    fn caller_overrides_win() {
        let (runner, backend) = recording_runner(Platform::Unix, &env_of(&[("A", "1")]));
        let override_env = env_of(&[("B", "2")]);
        runner
            .run(
                ["make"],
                RunOptions::new().cwd("build").env(override_env.clone()),
            )
            .unwrap();

        let invocation = backend.invocations().remove(0);
        assert_eq!(invocation.cwd, Some(std::env::temp_dir().join("build")));
        assert_eq!(invocation.env, Some(override_env));
    }

    #[test]
    fn shell_commands_get_forced_shell_on_unix_only() {
        let (runner, backend) = recording_runner(Platform::Unix, &EnvMap::new());
        runner.run(Command::shell("make && make install"), RunOptions::new()).unwrap();
        let invocation = backend.invocations().remove(0);
        assert_eq!(
            invocation.shell.executable,
            Some(PathBuf::from("/bin/bash"))
        );

        let (runner, backend) = recording_runner(Platform::Windows, &EnvMap::new());
        runner.run(Command::shell("nmake"), RunOptions::new()).unwrap();
        assert!(backend.invocations().remove(0).shell.is_empty());
    }

    #[test]
    fn check_run_failure_carries_rendered_command() {
        let (runner, backend) = recording_runner(Platform::Unix, &EnvMap::new());
        backend.push_exit_code(2);

        let err = runner
            .check_run(["cmake", "-G", "Unix Makefiles"], RunOptions::new())
            .unwrap_err();
        match err {
            ExecError::Command(err) => {
                assert_eq!(err.command(), "cmake -G 'Unix Makefiles'");
            }
            other => panic!("expected command error, got {other:?}"),
        }
        assert_eq!(
            backend.console_handle().lines(),
            vec!["+ cmake -G 'Unix Makefiles'"]
        );
    }

    #[test]
    fn unchecked_run_returns_nonzero_code() {
        let (runner, backend) = recording_runner(Platform::Unix, &EnvMap::new());
        backend.push_exit_code(1);
        assert_eq!(runner.run(["false"], RunOptions::new()).unwrap(), 1);
    }

    #[test]
    fn captured_failure_becomes_command_error() {
        let (runner, backend) = recording_runner(Platform::Windows, &EnvMap::new());
        backend.push_response(1, "partial");
        let err = runner
            .run_captured(["git", "describe", "--tags"], RunOptions::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "git describe --tags");
    }

    #[test]
    fn import_environment_sets_assignments_and_echoes_rest() {
        let (mut runner, backend) = recording_runner(Platform::Unix, &env_of(&[("FOO", "old")]));
        backend.push_output("FOO=bar\nnotaline\nBAZ=qux\n");

        runner.import_environment(". /opt/intel/vars.sh", "cmake").unwrap();

        assert_eq!(runner.var("FOO"), Some("bar"));
        assert_eq!(runner.var("BAZ"), Some("qux"));
        assert_eq!(
            backend.console_handle().lines(),
            vec![
                "+ . /opt/intel/vars.sh && cmake -E environment".to_string(),
                "notaline".to_string(),
            ]
        );
        let calls = backend.calls();
        let Some(RecordedCall::RunCaptured(invocation)) = calls.first() else {
            panic!("expected a captured run, got {calls:?}");
        };
        assert!(invocation.command.is_shell());
        assert_eq!(
            invocation.shell.executable,
            Some(PathBuf::from("/bin/bash"))
        );
    }

    #[test]
    fn import_environment_failure_is_command_error() {
        let (mut runner, backend) = recording_runner(Platform::Unix, &EnvMap::new());
        backend.push_exit_code(1);
        let err = runner.import_environment("false", "cmake").unwrap_err();
        assert_eq!(err.to_string(), "false && cmake -E environment");
    }

    #[test]
    fn dispatch_events_are_emitted_under_debug_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let (runner, backend) = recording_runner(Platform::Unix, &EnvMap::new());
            backend.push_exit_code(1);
            let err = runner
                .check_run(["ctest", "--output-on-failure"], RunOptions::new())
                .unwrap_err();
            assert_eq!(err.to_string(), "ctest --output-on-failure");
            assert_eq!(runner.run(["ctest"], RunOptions::new()).unwrap(), 0);
        });
    }

    #[test]
    fn find_executable_without_path_is_none() {
        let (runner, _) = recording_runner(Platform::Unix, &EnvMap::new());
        assert_eq!(runner.find_executable("sh"), None);
    }

    #[cfg(unix)]
    #[test]
    fn find_executable_uses_runner_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = assert_fs::TempDir::new().unwrap();
        let tool = dir.path().join("relexec-tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (mut runner, _) =
            recording_runner(Platform::Unix, &env_of(&[("PATH", "/nonexistent")]));
        assert_eq!(runner.find_executable("relexec-tool"), None);

        runner.prepend_var_with("PATH", dir.path().to_str().unwrap(), ":");
        assert_eq!(runner.find_executable("relexec-tool"), Some(tool));
    }
}
