use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::RelexecConfig;
use crate::loader::builder::ConfigBuilder;
use crate::loader::layers::ConfigLayerStack;

/// File name looked up in the user config directory and the workspace root.
pub const CONFIG_FILE_NAME: &str = "relexec.toml";

/// Selects an explicit configuration file instead of the workspace lookup.
pub const CONFIG_PATH_ENV: &str = "RELEXEC_CONFIG_PATH";

/// Forces the execution mode: truthy values select a dry run, falsy values a
/// real run.
pub const DRY_RUN_ENV: &str = "RELEXEC_DRY_RUN";

/// Loaded, validated configuration together with the layers it came from.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: RelexecConfig,
    config_path: Option<PathBuf>,
    workspace_root: PathBuf,
    layer_stack: ConfigLayerStack,
}

impl ConfigManager {
    /// Load configuration for the current directory, honouring
    /// `RELEXEC_CONFIG_PATH`.
    pub fn load() -> Result<Self> {
        ConfigBuilder::new().build()
    }

    pub fn load_from_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        ConfigBuilder::new()
            .workspace(workspace.as_ref().to_path_buf())
            .build()
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        ConfigBuilder::new()
            .config_file(path.as_ref().to_path_buf())
            .build()
    }

    pub(crate) fn from_layers(
        layer_stack: ConfigLayerStack,
        workspace_root: PathBuf,
    ) -> Result<Self> {
        let config: RelexecConfig = if layer_stack.is_empty() {
            RelexecConfig::default()
        } else {
            layer_stack
                .effective_config()
                .try_into()
                .context("Failed to deserialize effective configuration")?
        };

        config
            .validate()
            .context("Configuration failed validation")?;

        let config_path = layer_stack
            .layers()
            .iter()
            .rev()
            .find_map(|layer| layer.source.file().cloned());

        Ok(Self {
            config,
            config_path,
            workspace_root,
            layer_stack,
        })
    }

    pub(crate) fn load_toml_from_file(path: &Path) -> Result<toml::Value> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: toml::Value = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(value)
    }

    /// `<config dir>/relexec/relexec.toml`, when the platform has a config
    /// directory.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("relexec").join(CONFIG_FILE_NAME))
    }

    /// Builds the layer contributed by `RELEXEC_*` variables, if any is set.
    pub(crate) fn environment_layer() -> Result<Option<toml::Value>> {
        let Ok(raw) = std::env::var(DRY_RUN_ENV) else {
            return Ok(None);
        };

        let mode = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => "dry_run",
            "" | "0" | "false" | "no" | "off" => "real",
            other => bail!("{DRY_RUN_ENV} has unrecognised value `{other}`"),
        };

        let mut execution = toml::Table::new();
        execution.insert("mode".to_string(), toml::Value::String(mode.to_string()));
        let mut root = toml::Table::new();
        root.insert("execution".to_string(), toml::Value::Table(execution));
        Ok(Some(toml::Value::Table(root)))
    }

    pub fn config(&self) -> &RelexecConfig {
        &self.config
    }

    /// The highest-precedence file that contributed a layer.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn layer_stack(&self) -> &ConfigLayerStack {
        &self.layer_stack
    }

    pub fn effective_config(&self) -> toml::Value {
        self.layer_stack.effective_config()
    }
}
