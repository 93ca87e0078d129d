//! Credential resolution shared by all providers.
//!
//! Each provider declares an ordered list of [`CredentialSource`]s. The
//! resolver probes them in order and stops at the first hit. A missing,
//! unreadable or unparsable file is simply "not found".

use super::types::{Credential, Secret};
use crate::config::ConfigSource;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Everything a resolver may look at.
#[derive(Clone, Copy)]
pub struct CredentialContext<'a> {
    pub config: &'a ConfigSource,
    pub home: Option<&'a Path>,
}

/// How a resolved secret is presented to the provider API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    ApiKey,
    AccessToken,
}

/// A well-known credential file location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFile {
    /// Relative to the user's home directory.
    Home(&'static str),
    /// Inside a directory named by a config variable (e.g. `CODEX_HOME`).
    EnvDir {
        var: &'static str,
        file: &'static str,
    },
}

impl CredentialFile {
    /// Returns the absolute path and a display label, if the location applies.
    pub fn locate(&self, ctx: &CredentialContext<'_>) -> Option<(PathBuf, String)> {
        match self {
            CredentialFile::Home(relative) => {
                let path = ctx.home?.join(relative);
                Some((path, format!("~/{}", relative)))
            }
            CredentialFile::EnvDir { var, file } => {
                let (dir, _) = ctx.config.lookup(var)?;
                let path = PathBuf::from(dir).join(file);
                let label = path.display().to_string();
                Some((path, label))
            }
        }
    }
}

/// One place to look for a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Config lookup for each alias in order (env, then `.env`, then settings).
    Config(&'static [&'static str]),
    /// A JSON file; `fields` are dotted paths tried in order.
    JsonFile {
        file: CredentialFile,
        fields: &'static [&'static str],
    },
}

impl CredentialSource {
    /// Returns the secret and where it came from, or `None` if not found here.
    pub fn probe(&self, ctx: &CredentialContext<'_>) -> Option<(String, String)> {
        match self {
            CredentialSource::Config(names) => names.iter().find_map(|name| {
                ctx.config
                    .lookup(name)
                    .map(|(value, layer)| (value, format!("{}:{}", layer.label(), name)))
            }),
            CredentialSource::JsonFile { file, fields } => {
                let (path, label) = file.locate(ctx)?;
                let json = read_credential_json(&path)?;
                fields
                    .iter()
                    .find_map(|field| json_string_at(&json, field))
                    .map(|value| (value.to_string(), label))
            }
        }
    }
}

/// Probes `sources` in order and wraps the first hit as a [`Credential`].
pub fn resolve_chain(
    sources: &[CredentialSource],
    kind: SecretKind,
    ctx: &CredentialContext<'_>,
) -> Option<Credential> {
    let (value, source) = sources.iter().find_map(|s| s.probe(ctx))?;
    Some(match kind {
        SecretKind::ApiKey => Credential::api_key(value, source),
        SecretKind::AccessToken => Credential::access_token(value, source),
    })
}

/// Reads a JSON credential file, logging and swallowing any failure.
pub fn read_credential_json(path: &Path) -> Option<serde_json::Value> {
    if !path.exists() {
        return None;
    }
    match read_json_file(path) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::debug!("Skipping credential file: {:#}", e);
            None
        }
    }
}

fn read_json_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Looks up a dotted path (`"tokens.access_token"`) and returns a non-blank string.
pub fn json_string_at<'a>(json: &'a serde_json::Value, dotted: &str) -> Option<&'a str> {
    dotted
        .split('.')
        .try_fold(json, |value, key| value.get(key))?
        .as_str()
        .filter(|s| !s.trim().is_empty())
}

/// Extracts the ChatGPT account id claim from an OpenAI access token (JWT).
pub fn account_id_from_jwt(token: &str) -> Option<String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    // Decode payload (second part) with URL-safe base64
    use base64::Engine;
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    let json: serde_json::Value = serde_json::from_slice(&payload).ok()?;

    json["https://api.openai.com/auth"]["chatgpt_account_id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Builds a Codex credential from whatever parts were found.
pub fn codex_credential(
    api_key: Option<String>,
    access_token: Option<String>,
    account_id: Option<String>,
    sources: Vec<String>,
) -> Option<Credential> {
    if api_key.is_none() && access_token.is_none() && account_id.is_none() {
        return None;
    }
    Some(Credential {
        secret: Secret::Codex {
            api_key,
            access_token,
            account_id,
        },
        source: sources.join(", "),
    })
}

#[cfg(test)]
#[path = "tests/credentials_tests.rs"]
mod tests;
