//! Host-provided plugin settings (`settings.json`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// Settings written by the host's settings UI.
///
/// Every field is optional so older or partial files still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSettings {
    #[serde(default)]
    pub claude_access_token: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub zai_api_key: Option<String>,
    #[serde(default)]
    pub openrouter_api_key: Option<String>,
    #[serde(default)]
    pub opencode_api_key: Option<String>,
    /// Upper bound for a single provider fetch, in seconds.
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
}

impl HostSettings {
    /// Loads settings from disk, falling back to defaults when the file is
    /// missing or malformed.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No host settings at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring malformed settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Returns the settings field backing a known credential variable name.
    pub fn get(&self, name: &str) -> Option<&str> {
        let field = match name {
            "CLAUDE_ACCESS_TOKEN" => &self.claude_access_token,
            "OPENAI_API_KEY" => &self.openai_api_key,
            "ZAI_API_KEY" => &self.zai_api_key,
            "OPENROUTER_API_KEY" => &self.openrouter_api_key,
            "OPENCODE_API_KEY" => &self.opencode_api_key,
            _ => return None,
        };
        field.as_deref()
    }

    pub fn fetch_timeout(&self) -> Duration {
        let secs = self
            .fetch_timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }
}
