//! Provider-specific credential chains and usage fetchers.
//!
//! Every provider turns a credential into a [`ProviderResult`] and never
//! fails: HTTP errors, auth errors, odd payloads and transport failures all
//! become `error` results so the fan-out join always completes.

pub mod claude;
pub mod codex;
pub mod opencode_zen;
pub mod openrouter;
pub mod zai;

use super::credentials::{json_string_at, CredentialContext};
use super::http_client::{HttpClient, HttpResponse, ResponseBody};
use super::types::{Credential, ProviderResult, Service};
use std::sync::Arc;

const HINT_MAX_CHARS: usize = 200;

/// One usage provider: where its credentials live and how to read its quota.
pub trait UsageProvider: Send + Sync {
    fn service(&self) -> Service;

    /// Resolves a credential, or `None` when nothing usable was found.
    fn resolve(&self, ctx: &CredentialContext<'_>) -> Option<Credential>;

    /// Fetches and normalizes usage. Must not panic on any response.
    fn fetch(&self, credential: &Credential, http: &dyn HttpClient, now_ms: i64)
        -> ProviderResult;
}

/// The five built-in providers.
pub fn default_providers() -> Vec<Arc<dyn UsageProvider>> {
    vec![
        Arc::new(claude::ClaudeProvider),
        Arc::new(codex::CodexProvider),
        Arc::new(zai::ZaiProvider),
        Arc::new(openrouter::OpenrouterProvider),
        Arc::new(opencode_zen::OpencodeZenProvider),
    ]
}

/// Resolves credentials and fetches usage for one provider.
///
/// Without credentials no request is made.
pub fn run_provider(
    provider: &dyn UsageProvider,
    ctx: &CredentialContext<'_>,
    http: &dyn HttpClient,
    now_ms: i64,
) -> ProviderResult {
    let service = provider.service();
    let Some(credential) = provider.resolve(ctx) else {
        tracing::debug!("{}: no credentials", service);
        return ProviderResult::no_credentials(service);
    };

    tracing::debug!("{}: using credentials from {}", service, credential.source);
    let mut result = provider.fetch(&credential, http, now_ms);
    if result.source.is_none() {
        result.source = Some(credential.source.clone());
    }
    tracing::debug!("{}: {:?}", service, result.status);
    result
}

/// Reads a number that may be encoded as a JSON number or numeric string.
pub(crate) fn number_at(json: &serde_json::Value, key: &str) -> Option<f64> {
    let value = json.get(key)?;
    value
        .as_f64()
        .or_else(|| value.as_str()?.trim().parse::<f64>().ok())
}

/// Human-readable detail from an error body: the JSON message, or the raw text.
pub(crate) fn body_hint(body: &ResponseBody) -> Option<String> {
    let text = match body {
        ResponseBody::Json(json) => ["error.message", "message", "error", "msg", "detail"]
            .iter()
            .find_map(|path| json_string_at(json, path))?
            .trim()
            .to_string(),
        ResponseBody::Text(raw) => raw.trim().to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(truncate_chars(&text, HINT_MAX_CHARS))
    }
}

/// `error` result for an unexpected HTTP status.
pub(crate) fn status_error(
    service: Service,
    response: &HttpResponse,
    default_hint: &str,
) -> ProviderResult {
    let hint = body_hint(&response.body).unwrap_or_else(|| default_hint.to_string());
    ProviderResult::error(service, format!("HTTP {}", response.status), Some(hint))
}

/// `error` result for a request that never produced a response.
pub(crate) fn transport_error(service: Service, err: &anyhow::Error) -> ProviderResult {
    ProviderResult::error(
        service,
        "Request failed",
        Some(truncate_chars(&format!("{:#}", err), HINT_MAX_CHARS)),
    )
}

/// `error` result for a 200 response whose body is not JSON.
pub(crate) fn unexpected_body(service: Service, body: &ResponseBody) -> ProviderResult {
    ProviderResult::error(service, "Unexpected response", body_hint(body))
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
#[path = "tests/providers_tests.rs"]
mod tests;
