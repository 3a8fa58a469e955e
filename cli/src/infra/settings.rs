//! Infrastructure implementation of the `SettingsStore` port.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::SettingsStore;
use crate::domain::Settings;
use crate::infra::fs::{data_dir, write_private};

/// Settings kept in a YAML file (`~/.tgfleet/settings.yaml` by default,
/// `$TGFLEET_SETTINGS` when set).
pub struct YamlSettingsStore {
    path: PathBuf,
}

impl YamlSettingsStore {
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined.
    pub fn new() -> Result<Self> {
        if let Some(path) = std::env::var_os("TGFLEET_SETTINGS").filter(|v| !v.is_empty()) {
            return Ok(Self::with_path(PathBuf::from(path)));
        }
        Ok(Self::with_path(data_dir()?.join("settings.yaml")))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SettingsStore for YamlSettingsStore {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let content = serde_yaml::to_string(settings).context("cannot serialize settings")?;
        write_private(&self.path, content.as_bytes())
    }
}
