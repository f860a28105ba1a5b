//! Configuration for git-stacktrace
//!
//! Optional defaults for the CLI, loaded from ~/.git-stacktrace/config.toml.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Defaults applied when the corresponding flag is not given.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Skip pickaxe searches for unresolvable frames by default.
    #[serde(default)]
    pub fast: bool,

    /// Branch to use with --since, e.g. "origin/main".
    #[serde(default)]
    pub branch: Option<String>,
}

impl Config {
    /// Get config directory path (~/.git-stacktrace)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".git-stacktrace"))
    }

    /// Get config file path (~/.git-stacktrace/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Self::default()),
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}
