//! Data types for provider usage aggregation.

use crate::usage_reset::ResetTimestamp;
use serde::{Deserialize, Serialize};

/// The providers whose usage is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    Claude,
    Codex,
    Zai,
    Openrouter,
    OpencodeZen,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::Claude,
        Service::Codex,
        Service::Zai,
        Service::Openrouter,
        Service::OpencodeZen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Claude => "claude",
            Service::Codex => "codex",
            Service::Zai => "zai",
            Service::Openrouter => "openrouter",
            Service::OpencodeZen => "opencode-zen",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Ok,
    Error,
    NoCredentials,
}

/// A resolved secret. Never persisted and never logged.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    ApiKey(String),
    AccessToken(String),
    /// Codex can hold an API key and a ChatGPT OAuth pair at the same time.
    Codex {
        api_key: Option<String>,
        access_token: Option<String>,
        account_id: Option<String>,
    },
}

/// Credential for one fetch, with a description of where it was found.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub secret: Secret,
    pub source: String,
}

impl Credential {
    pub fn api_key(key: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            secret: Secret::ApiKey(key.into()),
            source: source.into(),
        }
    }

    pub fn access_token(token: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            secret: Secret::AccessToken(token.into()),
            source: source.into(),
        }
    }

    /// The single bearer value for API-key and access-token credentials.
    pub fn bearer(&self) -> Option<&str> {
        match &self.secret {
            Secret::ApiKey(value) | Secret::AccessToken(value) => Some(value),
            Secret::Codex { .. } => None,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.secret {
            Secret::ApiKey(_) => "api_key",
            Secret::AccessToken(_) => "access_token",
            Secret::Codex { .. } => "codex",
        };
        f.debug_struct("Credential")
            .field("kind", &kind)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// One quota window (5-hour, 7-day, or a balance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageWindow {
    pub used: String,
    pub remaining: String,
    pub resets_in: String,
    pub resets_at_ms: i64,
    pub used_percent: f64,
}

impl UsageWindow {
    /// Window for percentage-based providers. `used_percent` is clamped to 0-100.
    pub fn from_percent(used_percent: f64, reset: Option<ResetTimestamp>, now_ms: i64) -> Self {
        let used_percent = if used_percent.is_finite() {
            used_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        // Pre-epoch resets are garbage from the provider; treat them as unknown.
        let (resets_in, resets_at_ms) = match reset.filter(|ts| ts.epoch_ms > 0) {
            Some(ts) => (ts.resets_in(now_ms), ts.epoch_ms),
            None => (String::new(), 0),
        };

        Self {
            used: format!("{}%", used_percent.round() as i64),
            remaining: format!("{}%", (100.0 - used_percent).round() as i64),
            resets_in,
            resets_at_ms,
            used_percent,
        }
    }

    /// Window for balance-based providers, without a reset.
    pub fn from_balance(used_usd: f64, remaining_usd: f64, used_percent: f64) -> Self {
        Self {
            used: format_usd(used_usd),
            remaining: format_usd(remaining_usd.max(0.0)),
            resets_in: String::new(),
            resets_at_ms: 0,
            used_percent: used_percent.clamp(0.0, 100.0),
        }
    }
}

fn format_usd(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Normalized outcome of one provider fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub service: Service,
    pub status: FetchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub five_hour: Option<UsageWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seven_day: Option<UsageWindow>,
}

impl ProviderResult {
    fn with_status(service: Service, status: FetchStatus) -> Self {
        Self {
            service,
            status,
            error: None,
            hint: None,
            source: None,
            plan: None,
            five_hour: None,
            seven_day: None,
        }
    }

    pub fn ok(service: Service) -> Self {
        Self::with_status(service, FetchStatus::Ok)
    }

    pub fn no_credentials(service: Service) -> Self {
        Self::with_status(service, FetchStatus::NoCredentials)
    }

    pub fn error(service: Service, error: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            error: Some(error.into()),
            hint,
            ..Self::with_status(service, FetchStatus::Error)
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// One complete refresh snapshot, as cached and handed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub ok: bool,
    /// Absent in old or hand-edited caches; zero is always stale.
    #[serde(default)]
    pub fetched_at_ms: i64,
    pub data: Vec<ProviderResult>,
}

impl Payload {
    /// Builds a payload with `data` sorted by service name.
    pub fn new(fetched_at_ms: i64, mut data: Vec<ProviderResult>) -> Self {
        data.sort_by(|a, b| a.service.as_str().cmp(b.service.as_str()));
        Self {
            ok: true,
            fetched_at_ms,
            data,
        }
    }
}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
