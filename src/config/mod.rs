//! Layered configuration lookup.
//!
//! Credential resolvers never read the process environment directly. They
//! receive a [`ConfigSource`] snapshot that merges, in precedence order:
//! - the process environment
//! - the plugin `.env` file
//! - host-provided settings (`settings.json`)

pub mod dotenv;
pub mod settings;

pub use settings::HostSettings;

use std::collections::HashMap;
use std::path::PathBuf;

/// The layer a configuration value was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    Env,
    Dotenv,
    Settings,
}

impl ConfigLayer {
    pub fn label(&self) -> &'static str {
        match self {
            ConfigLayer::Env => "env",
            ConfigLayer::Dotenv => ".env",
            ConfigLayer::Settings => "settings",
        }
    }
}

#[derive(Clone)]
enum EnvLayer {
    Process,
    Fixed(HashMap<String, String>),
}

impl EnvLayer {
    fn get(&self, name: &str) -> Option<String> {
        match self {
            EnvLayer::Process => std::env::var(name).ok(),
            EnvLayer::Fixed(values) => values.get(name).cloned(),
        }
    }
}

/// Merged key/value view over environment, `.env` and host settings.
#[derive(Clone)]
pub struct ConfigSource {
    env: EnvLayer,
    dotenv_path: Option<PathBuf>,
    dotenv: HashMap<String, String>,
    settings: HostSettings,
}

impl ConfigSource {
    /// Builds a source backed by the real process environment and the given
    /// `.env` file.
    pub fn load(dotenv_path: PathBuf, settings: HostSettings) -> Self {
        let dotenv = dotenv::load_dotenv(&dotenv_path);
        Self {
            env: EnvLayer::Process,
            dotenv_path: Some(dotenv_path),
            dotenv,
            settings,
        }
    }

    /// Builds a source from fixed maps. The process environment is not consulted.
    pub fn from_layers(
        env: HashMap<String, String>,
        dotenv: HashMap<String, String>,
        settings: HostSettings,
    ) -> Self {
        Self {
            env: EnvLayer::Fixed(env),
            dotenv_path: None,
            dotenv,
            settings,
        }
    }

    /// Re-reads the `.env` file, if this source was loaded from one.
    pub fn reload_dotenv(&mut self) {
        if let Some(path) = &self.dotenv_path {
            self.dotenv = dotenv::load_dotenv(path);
        }
    }

    /// Returns the first non-empty value for `name` and the layer it came from.
    pub fn lookup(&self, name: &str) -> Option<(String, ConfigLayer)> {
        if let Some(value) = self.env.get(name).filter(|v| !v.is_empty()) {
            return Some((value, ConfigLayer::Env));
        }
        if let Some(value) = self.dotenv.get(name).filter(|v| !v.is_empty()) {
            return Some((value.clone(), ConfigLayer::Dotenv));
        }
        self.settings
            .get(name)
            .filter(|v| !v.is_empty())
            .map(|value| (value.to_string(), ConfigLayer::Settings))
    }

    /// Returns the value for `name`, or an empty string when no layer has it.
    pub fn get_env_value(&self, name: &str) -> String {
        self.lookup(name).map(|(value, _)| value).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
