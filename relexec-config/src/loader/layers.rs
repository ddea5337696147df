use std::path::PathBuf;

use toml::Value as TomlValue;

/// Where a configuration layer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Per-user file, e.g. `~/.config/relexec/relexec.toml`.
    User { file: PathBuf },
    /// `relexec.toml` in the workspace root, or an explicitly selected file.
    Workspace { file: PathBuf },
    /// `RELEXEC_*` environment variables.
    Environment,
    /// Overrides supplied by the embedding program.
    Runtime,
}

impl ConfigLayerSource {
    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            Self::User { file } | Self::Workspace { file } => Some(file),
            Self::Environment | Self::Runtime => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayerEntry {
    pub source: ConfigLayerSource,
    pub config: TomlValue,
}

impl ConfigLayerEntry {
    pub fn new(source: ConfigLayerSource, config: TomlValue) -> Self {
        Self { source, config }
    }
}

/// Configuration layers ordered from lowest to highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayerStack {
    layers: Vec<ConfigLayerEntry>,
}

impl ConfigLayerStack {
    pub fn push(&mut self, layer: ConfigLayerEntry) {
        self.layers.push(layer);
    }

    /// Deep-merges every layer into one TOML table.
    pub fn effective_config(&self) -> TomlValue {
        let mut merged = TomlValue::Table(toml::Table::new());
        for layer in &self.layers {
            overlay(&mut merged, &layer.config);
        }
        merged
    }

    pub fn layers(&self) -> &[ConfigLayerEntry] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Tables merge key by key; any other value in `top` replaces `base`.
fn overlay(base: &mut TomlValue, top: &TomlValue) {
    if let (TomlValue::Table(base_table), TomlValue::Table(top_table)) = (&mut *base, top) {
        for (key, value) in top_table {
            match base_table.get_mut(key) {
                Some(slot) => overlay(slot, value),
                None => {
                    base_table.insert(key.clone(), value.clone());
                }
            }
        }
        return;
    }
    *base = top.clone();
}
