//! Fallback lookup of environment variables in `$HOME/.release-pilot/settings.json`.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings loaded from `$HOME/.release-pilot/settings.json`.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Environment variable fallbacks.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::settings_path()?)
    }

    /// Loads settings from `path`; a missing file yields empty settings.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(".release-pilot").join("settings.json"))
    }

    /// First non-empty value of `keys`, from the environment then from these settings.
    pub fn lookup(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()))
            .or_else(|| {
                keys.iter()
                    .find_map(|key| self.env.get(*key).filter(|v| !v.is_empty()).cloned())
            })
    }
}

/// First non-empty value of `keys`, falling back to the settings file.
pub fn get_env_vars(keys: &[&str]) -> Option<String> {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::debug!("Ignoring settings file: {e}");
            Settings::default()
        }
    };
    settings.lookup(keys)
}
