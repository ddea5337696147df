use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};
use crate::loader::manager::{CONFIG_FILE_NAME, CONFIG_PATH_ENV, ConfigManager};

#[derive(Debug, Clone, Default)]
enum UserConfig {
    #[default]
    Default,
    Disabled,
    File(PathBuf),
}

/// Builder for creating a [`ConfigManager`] with custom sources and
/// overrides.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    workspace: Option<PathBuf>,
    config_file: Option<PathBuf>,
    user_config: UserConfig,
    read_environment: bool,
    runtime_overrides: Vec<(String, toml::Value)>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            workspace: None,
            config_file: None,
            user_config: UserConfig::Default,
            read_environment: true,
            runtime_overrides: Vec::new(),
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory searched for `relexec.toml`. Defaults to the current
    /// directory.
    pub fn workspace(mut self, path: PathBuf) -> Self {
        self.workspace = Some(path);
        self
    }

    /// Use this file instead of the workspace lookup.
    pub fn config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    /// Read the user layer from `path` instead of the platform config
    /// directory.
    pub fn user_config_file(mut self, path: PathBuf) -> Self {
        self.user_config = UserConfig::File(path);
        self
    }

    pub fn without_user_config(mut self) -> Self {
        self.user_config = UserConfig::Disabled;
        self
    }

    /// Skip the `RELEXEC_*` environment layer.
    pub fn ignore_environment(mut self) -> Self {
        self.read_environment = false;
        self
    }

    /// Add a runtime override such as `("execution.mode", "dry_run")`.
    pub fn runtime_override(mut self, key: impl Into<String>, value: toml::Value) -> Self {
        self.runtime_overrides.push((key.into(), value));
        self
    }

    /// Add overrides from string pairs. Values are parsed as TOML and fall
    /// back to plain strings.
    pub fn runtime_overrides(mut self, overrides: &[(String, String)]) -> Self {
        for (key, value) in overrides {
            let toml_value = value
                .parse::<toml::Value>()
                .unwrap_or_else(|_| toml::Value::String(value.clone()));
            self.runtime_overrides.push((key.clone(), toml_value));
        }
        self
    }

    pub fn build(self) -> Result<ConfigManager> {
        let workspace = match self.workspace {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };

        let config_file = self.config_file.or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        });

        let mut layer_stack = ConfigLayerStack::default();

        let user_file = match self.user_config {
            UserConfig::Default => ConfigManager::user_config_path(),
            UserConfig::Disabled => None,
            UserConfig::File(path) => Some(path),
        };
        if let Some(file) = user_file.filter(|file| file.exists()) {
            match ConfigManager::load_toml_from_file(&file) {
                Ok(toml) => {
                    layer_stack.push(ConfigLayerEntry::new(ConfigLayerSource::User { file }, toml))
                }
                Err(error) => {
                    tracing::warn!(%error, "ignoring unreadable user configuration");
                }
            }
        }

        let workspace_file = match config_file {
            Some(file) => Some(file),
            None => Some(workspace.join(CONFIG_FILE_NAME)).filter(|file| file.exists()),
        };
        if let Some(file) = workspace_file {
            let toml = ConfigManager::load_toml_from_file(&file)?;
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Workspace { file },
                toml,
            ));
        }

        if self.read_environment {
            if let Some(toml) = ConfigManager::environment_layer()? {
                layer_stack.push(ConfigLayerEntry::new(ConfigLayerSource::Environment, toml));
            }
        }

        if !self.runtime_overrides.is_empty() {
            let mut runtime_toml = toml::Table::new();
            for (key, value) in self.runtime_overrides {
                insert_dotted_key(&mut runtime_toml, &key, value);
            }
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Runtime,
                toml::Value::Table(runtime_toml),
            ));
        }

        ConfigManager::from_layers(layer_stack, workspace)
    }
}

fn insert_dotted_key(table: &mut toml::Table, key: &str, value: toml::Value) {
    match key.split_once('.') {
        None => {
            table.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            if let toml::Value::Table(child) = entry {
                insert_dotted_key(child, rest, value);
            }
        }
    }
}
