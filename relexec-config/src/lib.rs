//! Layered configuration for relexec runner stacks.
//!
//! Layers are read from the user config directory and the workspace root,
//! deep-merged as TOML, and finally overridden by `RELEXEC_*` environment
//! variables and runtime overrides supplied by the embedding program.

pub mod config;
pub mod loader;

pub use config::{
    EnvironmentConfig, ExecutionConfig, ExecutionMode, LoggingConfig, PlatformSetting,
    RelexecConfig, ShellConfig,
};
pub use loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};
pub use loader::{ConfigBuilder, ConfigManager};
