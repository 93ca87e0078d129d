//! Claude subscription usage via the OAuth usage endpoint.

use super::{number_at, status_error, transport_error, unexpected_body, UsageProvider};
use crate::usage::credentials::{
    resolve_chain, CredentialContext, CredentialFile, CredentialSource, SecretKind,
};
use crate::usage::http_client::HttpClient;
use crate::usage::types::{Credential, ProviderResult, Service, UsageWindow};
use crate::usage_reset::ResetTimestamp;

pub const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";
const OAUTH_BETA: &str = "oauth-2025-04-20";

const TOKEN_FIELDS: &[&str] = &["claudeAiOauth.accessToken", "accessToken"];

const CREDENTIAL_SOURCES: &[CredentialSource] = &[
    CredentialSource::Config(&["CLAUDE_ACCESS_TOKEN"]),
    CredentialSource::JsonFile {
        file: CredentialFile::EnvDir {
            var: "CLAUDE_CONFIG_DIR",
            file: ".credentials.json",
        },
        fields: TOKEN_FIELDS,
    },
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".claude/.credentials.json"),
        fields: TOKEN_FIELDS,
    },
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".claude/credentials.json"),
        fields: TOKEN_FIELDS,
    },
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".config/claude/credentials.json"),
        fields: TOKEN_FIELDS,
    },
];

pub struct ClaudeProvider;

impl UsageProvider for ClaudeProvider {
    fn service(&self) -> Service {
        Service::Claude
    }

    fn resolve(&self, ctx: &CredentialContext<'_>) -> Option<Credential> {
        resolve_chain(CREDENTIAL_SOURCES, SecretKind::AccessToken, ctx)
    }

    fn fetch(
        &self,
        credential: &Credential,
        http: &dyn HttpClient,
        now_ms: i64,
    ) -> ProviderResult {
        let Some(token) = credential.bearer() else {
            return ProviderResult::no_credentials(Service::Claude);
        };

        let headers = [
            ("Authorization", format!("Bearer {}", token)),
            ("anthropic-beta", OAUTH_BETA.to_string()),
        ];
        let response = match http.get(USAGE_URL, &headers) {
            Ok(response) => response,
            Err(e) => return transport_error(Service::Claude, &e),
        };

        match response.status {
            200 => match response.body.json() {
                Some(json) => parse_usage(json, now_ms),
                None => unexpected_body(Service::Claude, &response.body),
            },
            401 => ProviderResult::error(
                Service::Claude,
                "Token expired",
                Some("Run `claude` to re-authenticate, then refresh".to_string()),
            ),
            _ => status_error(
                Service::Claude,
                &response,
                "Check your Claude subscription at https://claude.ai/settings/usage",
            ),
        }
    }
}

fn parse_usage(json: &serde_json::Value, now_ms: i64) -> ProviderResult {
    let mut result = ProviderResult::ok(Service::Claude);
    result.five_hour = parse_window(&json["five_hour"], now_ms);
    result.seven_day = parse_window(&json["seven_day"], now_ms);
    result
}

fn parse_window(value: &serde_json::Value, now_ms: i64) -> Option<UsageWindow> {
    if !value.is_object() {
        return None;
    }

    let used_percent = number_at(value, "utilization").unwrap_or(0.0);
    let reset_at = value["resets_at"]
        .as_str()
        .and_then(ResetTimestamp::parse_rfc3339);

    Some(UsageWindow::from_percent(used_percent, reset_at, now_ms))
}
