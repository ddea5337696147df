//! # relexec
//!
//! Execution layer for release-engineering scripts. Orchestration code asks
//! a [`CommandRunner`] to run commands and a [`Backend`] to touch the
//! filesystem; whether that happens for real, as a dry run, or against a
//! recording double is decided once, when the [`ExecutorFactory`] is built.
//!
//! ```no_run
//! use relexec::{ConfigManager, ExecutorFactory, RunOptions, initialize_tracing};
//!
//! # fn main() -> anyhow::Result<()> {
//! let manager = ConfigManager::load()?;
//! initialize_tracing(&manager.config().logging)?;
//!
//! let factory = ExecutorFactory::from_config(manager.config())?;
//! let mut runner = factory.command_runner();
//! runner.prepend_var("CFLAGS", "-O2");
//! runner.check_run(["make", "-j8"], RunOptions::new())?;
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod logging;

pub use factory::{ExecutorFactory, environment_snapshot, resolve_platform};
pub use logging::initialize_tracing;

pub use relexec_config::{
    ConfigBuilder, ConfigManager, EnvironmentConfig, ExecutionMode, LoggingConfig,
    PlatformSetting, RelexecConfig,
};
pub use relexec_runner::{
    Backend, Command, CommandError, CommandRunner, DirectoryTracker, EnvMap, ExecError, Platform,
    RunOptions, ShellOptions,
};
