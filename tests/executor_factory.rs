use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use pretty_assertions::assert_eq;
use relexec::{
    DirectoryTracker, EnvMap, ExecError, ExecutorFactory, Platform, PlatformSetting,
    RelexecConfig, RunOptions,
};
use relexec_config::ExecutionMode;
use relexec_runner::{Command, RecordedCall, RecordingBackend};
use tempfile::TempDir;

fn isolated_config(mode: ExecutionMode) -> RelexecConfig {
    let mut config = RelexecConfig::default();
    config.execution.mode = mode;
    config.environment.inherit = false;
    config
        .environment
        .set
        .insert("PATH".to_string(), "/usr/bin:/bin".to_string());
    config
}

fn recording_factory(dir: &TempDir) -> Result<(ExecutorFactory, Arc<RecordingBackend>)> {
    let tracker = DirectoryTracker::with_path(dir.path())?;
    let backend = RecordingBackend::shared(tracker.clone());
    let mut env = EnvMap::new();
    env.insert("STAGE".to_string(), "base".to_string());
    let factory = ExecutorFactory::with_backend(tracker, env, Platform::Unix, backend.clone());
    Ok((factory, backend))
}

#[test]
fn runners_never_share_environment() -> Result<()> {
    let dir = TempDir::new()?;
    let (factory, _) = recording_factory(&dir)?;

    let mut first = factory.command_runner();
    let second = factory.command_runner();
    first.set_var("STAGE", Some("patched"));
    first.append_var("CFLAGS", "-O2");

    assert_eq!(first.var("STAGE"), Some("patched"));
    assert_eq!(second.var("STAGE"), Some("base"));
    assert_eq!(second.var("CFLAGS"), None);
    assert_eq!(factory.environment().get("STAGE").map(String::as_str), Some("base"));
    Ok(())
}

#[test]
fn runners_share_the_tracked_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let (factory, backend) = recording_factory(&dir)?;
    let runner = factory.command_runner();

    let nested = dir.path().join("build");
    factory.tracker().change(&nested)?;
    runner.run(["cmake", ".."], RunOptions::new())?;

    let invocations = backend.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].cwd.as_deref(), Some(nested.as_path()));
    Ok(())
}

#[test]
fn shell_commands_use_configured_shell() -> Result<()> {
    let dir = TempDir::new()?;
    let (factory, backend) = recording_factory(&dir)?;
    let factory = factory.with_shell_options(
        relexec::ShellOptions::default().with_executable("/usr/local/bin/bash"),
    );

    factory
        .command_runner()
        .run(Command::shell("echo $STAGE"), RunOptions::new())?;

    let calls = backend.calls();
    let Some(RecordedCall::Run(invocation)) = calls.first() else {
        panic!("expected a recorded run, got {calls:?}");
    };
    assert_eq!(
        invocation.shell.executable,
        Some(PathBuf::from("/usr/local/bin/bash"))
    );
    Ok(())
}

#[test]
fn scripted_failure_surfaces_as_command_error() -> Result<()> {
    let dir = TempDir::new()?;
    let (factory, backend) = recording_factory(&dir)?;
    backend.push_exit_code(2);

    let err = factory
        .command_runner()
        .check_run(["make", "install"], RunOptions::new())
        .unwrap_err();
    assert!(matches!(&err, ExecError::Command(inner) if inner.command() == "make install"));
    assert!(backend.console_handle().contains("+ make install"));
    Ok(())
}

#[test]
fn dry_run_config_suppresses_mutations() -> Result<()> {
    let dir = TempDir::new()?;
    let tracker = DirectoryTracker::with_path(dir.path())?;
    let factory = ExecutorFactory::from_config_in(&isolated_config(ExecutionMode::DryRun), tracker);

    let runner = factory.command_runner();
    assert_eq!(runner.run(["false"], RunOptions::new())?, 0);
    assert_eq!(runner.run_captured(["echo", "hi"], RunOptions::new())?, "");

    let backend = factory.backend();
    backend.write_file(&dir.path().join("out.txt"), "payload")?;
    backend.ensure_directory(&dir.path().join("stage"), true)?;
    assert!(!dir.path().join("out.txt").exists());
    assert!(!dir.path().join("stage").exists());

    fs::write(dir.path().join("keep.txt"), "still here")?;
    backend.delete_path(&dir.path().join("keep.txt"))?;
    assert!(dir.path().join("keep.txt").exists());
    Ok(())
}

#[test]
fn configured_platform_reaches_runners() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = isolated_config(ExecutionMode::DryRun);
    config.execution.platform = PlatformSetting::Windows;
    config.shell.executable = Some(PathBuf::from("/bin/zsh"));

    let tracker = DirectoryTracker::with_path(dir.path())?;
    let factory = ExecutorFactory::from_config_in(&config, tracker);
    let runner = factory.command_runner();

    assert_eq!(factory.platform(), Platform::Windows);
    assert!(runner.shell_options().is_empty());
    Ok(())
}

#[cfg(unix)]
#[test]
fn real_config_runs_processes_in_tracked_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = isolated_config(ExecutionMode::Real);
    config.execution.platform = PlatformSetting::Unix;
    config.environment.prepend_path = vec![dir.path().display().to_string()];

    let tracker = DirectoryTracker::with_path(dir.path())?;
    let factory = ExecutorFactory::from_config_in(&config, tracker);
    let runner = factory.command_runner();
    assert_eq!(
        runner.var("PATH"),
        Some(format!("{}:/usr/bin:/bin", dir.path().display()).as_str())
    );

    runner.check_run(["touch", "marker"], RunOptions::new())?;
    assert!(dir.path().join("marker").exists());

    let output = runner.run_captured(Command::shell("echo \"$PATH\""), RunOptions::new())?;
    assert!(output.starts_with(&dir.path().display().to_string()));
    Ok(())
}
