//! Codex (ChatGPT subscription) usage, with an API-key fallback.

use super::{number_at, status_error, transport_error, unexpected_body, UsageProvider};
use crate::usage::credentials::{
    account_id_from_jwt, codex_credential, json_string_at, read_credential_json,
    CredentialContext, CredentialFile,
};
use crate::usage::http_client::HttpClient;
use crate::usage::types::{Credential, ProviderResult, Secret, Service, UsageWindow};
use crate::usage_reset::ResetTimestamp;

pub const WHAM_URL: &str = "https://chatgpt.com/backend-api/wham/usage";
pub const MODELS_URL: &str = "https://api.openai.com/v1/models";

const API_KEY_NAME: &str = "OPENAI_API_KEY";

const AUTH_FILES: &[CredentialFile] = &[
    CredentialFile::EnvDir {
        var: "CODEX_HOME",
        file: "auth.json",
    },
    CredentialFile::Home(".codex/auth.json"),
    CredentialFile::Home(".config/codex/auth.json"),
];

const OAUTH_HINT: &str =
    "API key is valid, but subscription quota needs ChatGPT sign-in. Run `codex login`";

pub struct CodexProvider;

impl UsageProvider for CodexProvider {
    fn service(&self) -> Service {
        Service::Codex
    }

    /// Collects the API key, OAuth token and account id across every source.
    fn resolve(&self, ctx: &CredentialContext<'_>) -> Option<Credential> {
        let mut sources = Vec::new();
        let mut api_key = ctx.config.lookup(API_KEY_NAME).map(|(value, layer)| {
            sources.push(format!("{}:{}", layer.label(), API_KEY_NAME));
            value
        });
        let mut access_token = None;
        let mut account_id = None;

        for file in AUTH_FILES {
            if access_token.is_some() && account_id.is_some() {
                break;
            }
            let Some((path, label)) = file.locate(ctx) else {
                continue;
            };
            let Some(json) = read_credential_json(&path) else {
                continue;
            };

            let mut used = fill_missing(&mut api_key, &json, API_KEY_NAME);
            used |= fill_missing(&mut access_token, &json, "tokens.access_token");
            used |= fill_missing(&mut account_id, &json, "tokens.account_id");
            if used {
                sources.push(label);
            }
        }

        if account_id.is_none() {
            account_id = access_token.as_deref().and_then(account_id_from_jwt);
        }

        codex_credential(api_key, access_token, account_id, sources)
    }

    fn fetch(
        &self,
        credential: &Credential,
        http: &dyn HttpClient,
        now_ms: i64,
    ) -> ProviderResult {
        let Secret::Codex {
            api_key,
            access_token,
            account_id,
        } = &credential.secret
        else {
            return ProviderResult::no_credentials(Service::Codex);
        };

        let mut oauth_failure = None;
        if let Some(token) = access_token {
            let mut headers = vec![("Authorization", format!("Bearer {}", token))];
            if let Some(id) = account_id {
                headers.push(("chatgpt-account-id", id.clone()));
            }

            match http.get(WHAM_URL, &headers) {
                Ok(response) if response.status == 200 => {
                    return match response.body.json() {
                        Some(json) => parse_usage(json, now_ms),
                        None => unexpected_body(Service::Codex, &response.body),
                    };
                }
                Ok(response) if response.status == 401 => {
                    oauth_failure = Some(ProviderResult::error(
                        Service::Codex,
                        "Token expired",
                        Some("Run `codex login` to re-authenticate, then refresh".to_string()),
                    ));
                }
                Ok(response) => {
                    oauth_failure = Some(status_error(
                        Service::Codex,
                        &response,
                        "ChatGPT usage endpoint returned an error",
                    ));
                }
                Err(e) => oauth_failure = Some(transport_error(Service::Codex, &e)),
            }
        }

        match (api_key, oauth_failure) {
            (Some(key), failure) => {
                if failure.is_some() {
                    tracing::debug!("codex: OAuth usage failed, checking API key instead");
                }
                check_api_key(key, http)
            }
            (None, Some(failure)) => failure,
            (None, None) => ProviderResult::no_credentials(Service::Codex),
        }
    }
}

/// Sets `slot` from `field` when still empty. Returns whether it did.
fn fill_missing(slot: &mut Option<String>, json: &serde_json::Value, field: &str) -> bool {
    if slot.is_some() {
        return false;
    }
    match json_string_at(json, field) {
        Some(value) => {
            *slot = Some(value.to_string());
            true
        }
        None => false,
    }
}

/// Validates the API key. An API key cannot see subscription quota, so a
/// valid key yields `ok` without windows.
fn check_api_key(api_key: &str, http: &dyn HttpClient) -> ProviderResult {
    let headers = [("Authorization", format!("Bearer {}", api_key))];
    match http.get(MODELS_URL, &headers) {
        Ok(response) if response.status == 200 => {
            ProviderResult::ok(Service::Codex).with_hint(OAUTH_HINT)
        }
        Ok(response) if response.status == 401 => ProviderResult::error(
            Service::Codex,
            "Invalid API key",
            Some("Check OPENAI_API_KEY".to_string()),
        ),
        Ok(response) => status_error(Service::Codex, &response, "OpenAI API returned an error"),
        Err(e) => transport_error(Service::Codex, &e),
    }
}

fn parse_usage(json: &serde_json::Value, now_ms: i64) -> ProviderResult {
    let rate_limit = &json["rate_limit"];
    let mut result = ProviderResult::ok(Service::Codex);
    result.five_hour = parse_window(&rate_limit["primary_window"], now_ms);
    result.seven_day = parse_window(&rate_limit["secondary_window"], now_ms);
    result.plan = json_string_at(json, "plan_type").map(String::from);
    result
}

fn parse_window(value: &serde_json::Value, now_ms: i64) -> Option<UsageWindow> {
    if !value.is_object() {
        return None;
    }

    let used_percent = number_at(value, "used_percent").unwrap_or(0.0);
    let reset = match number_at(value, "reset_after_seconds") {
        Some(seconds) => Some(ResetTimestamp::after_seconds(now_ms, seconds)),
        None => number_at(value, "reset_at")
            .filter(|seconds| *seconds > 0.0)
            .map(|seconds| ResetTimestamp::from_epoch_seconds(seconds as i64)),
    };

    Some(UsageWindow::from_percent(used_percent, reset, now_ms))
}
