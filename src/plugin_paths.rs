//! Plugin directory layout.
//!
//! Everything the monitor reads or writes lives in one directory, by default
//! `<config dir>/usage-monitor/`:
//! - `.env` - Credential overrides, re-read on every refresh
//! - `settings.json` - Host-provided settings
//! - `usage-cache.json` - Last aggregated payload

use crate::usage::store::CACHE_FILENAME;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The name of the plugin directory under the platform config dir.
const PLUGIN_DIR: &str = "usage-monitor";

const DOTENV_FILENAME: &str = ".env";
const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginPaths {
    root: PathBuf,
}

impl PluginPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Uses `override_dir` when given, otherwise the platform default.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the platform config
    /// directory cannot be determined.
    pub fn resolve(override_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = override_dir {
            return Ok(Self::new(dir));
        }
        let config = dirs::config_dir().context("Could not determine config directory")?;
        Ok(Self::new(config.join(PLUGIN_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the dotenv path: `<root>/.env`
    pub fn dotenv_path(&self) -> PathBuf {
        self.root.join(DOTENV_FILENAME)
    }

    /// Returns the settings path: `<root>/settings.json`
    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILENAME)
    }

    /// Returns the cache path: `<root>/usage-cache.json`
    pub fn cache_path(&self) -> PathBuf {
        self.root.join(CACHE_FILENAME)
    }
}

#[cfg(test)]
#[path = "plugin_paths_tests.rs"]
mod tests;
