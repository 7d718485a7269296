//! Project configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::changelog::ChangelogConfig;
use crate::event::ParserConfig;
use crate::git::GitOpsConfig;
use crate::version::NextVersionMode;

/// Configuration file looked up in the workspace.
pub const DEFAULT_CONFIG_FILE: &str = ".release-pilot.yml";

/// Where and how the project declares its version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionConfig {
    /// Component bumped after a release ships.
    pub next_version_mode: NextVersionMode,
    /// Version patterns (`<glob>::<regex>::<group>` entries); built-in defaults when unset.
    pub patterns: Option<String>,
}

/// Everything a release run needs, passed explicitly to constructors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    /// Event classification conventions.
    pub parser: ParserConfig,
    /// Commit and tag settings.
    pub git: GitOpsConfig,
    /// Version file settings.
    pub version: VersionConfig,
    /// Changelog generator settings.
    pub changelog: ChangelogConfig,
    /// Detect and report without writing files or touching git.
    pub dry_run: bool,
    /// GitHub token; never read from or written to the file.
    #[serde(skip)]
    pub token: Option<String>,
}

impl ProjectConfig {
    /// Loads `.release-pilot.yml` from `workspace`.
    pub fn load(workspace: &Path) -> Result<Self> {
        Self::load_from_path(Self::default_path(workspace))
    }

    /// Loads a configuration file; a missing file yields the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Default configuration path inside `workspace`.
    pub fn default_path(workspace: &Path) -> PathBuf {
        workspace.join(DEFAULT_CONFIG_FILE)
    }
}
