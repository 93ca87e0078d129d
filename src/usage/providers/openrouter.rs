//! OpenRouter credit balance.

use super::{number_at, status_error, transport_error, unexpected_body, UsageProvider};
use crate::usage::credentials::{
    resolve_chain, CredentialContext, CredentialFile, CredentialSource, SecretKind,
};
use crate::usage::http_client::HttpClient;
use crate::usage::types::{Credential, ProviderResult, Service, UsageWindow};

pub const CREDITS_URL: &str = "https://openrouter.ai/api/v1/credits";

const KEY_FIELDS: &[&str] = &["OPENROUTER_API_KEY", "apiKey", "api_key"];

const CREDENTIAL_SOURCES: &[CredentialSource] = &[
    CredentialSource::Config(&["OPENROUTER_API_KEY"]),
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".config/openrouter/config.json"),
        fields: KEY_FIELDS,
    },
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".openrouter/config.json"),
        fields: KEY_FIELDS,
    },
];

pub struct OpenrouterProvider;

impl UsageProvider for OpenrouterProvider {
    fn service(&self) -> Service {
        Service::Openrouter
    }

    fn resolve(&self, ctx: &CredentialContext<'_>) -> Option<Credential> {
        resolve_chain(CREDENTIAL_SOURCES, SecretKind::ApiKey, ctx)
    }

    fn fetch(
        &self,
        credential: &Credential,
        http: &dyn HttpClient,
        _now_ms: i64,
    ) -> ProviderResult {
        let Some(api_key) = credential.bearer() else {
            return ProviderResult::no_credentials(Service::Openrouter);
        };

        let headers = [("Authorization", format!("Bearer {}", api_key))];
        let response = match http.get(CREDITS_URL, &headers) {
            Ok(response) => response,
            Err(e) => return transport_error(Service::Openrouter, &e),
        };

        match response.status {
            200 => match response.body.json() {
                Some(json) => parse_credits(json),
                None => unexpected_body(Service::Openrouter, &response.body),
            },
            401 => ProviderResult::error(
                Service::Openrouter,
                "Invalid API key",
                Some("Check OPENROUTER_API_KEY".to_string()),
            ),
            _ => status_error(
                Service::Openrouter,
                &response,
                "OpenRouter credits endpoint returned an error",
            ),
        }
    }
}

fn parse_credits(json: &serde_json::Value) -> ProviderResult {
    let data = &json["data"];
    let mut result = ProviderResult::ok(Service::Openrouter);
    if !data.is_object() {
        return result;
    }

    let credits = number_at(data, "total_credits").unwrap_or(0.0);
    let usage = number_at(data, "total_usage").unwrap_or(0.0);
    let used_percent = if credits > 0.0 {
        100.0 * usage / credits
    } else {
        0.0
    };
    result.five_hour = Some(UsageWindow::from_balance(usage, credits - usage, used_percent));
    result
}
