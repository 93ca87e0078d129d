//! OpenCode Zen prepaid balance.

use super::{number_at, status_error, transport_error, unexpected_body, UsageProvider};
use crate::usage::credentials::{
    resolve_chain, CredentialContext, CredentialFile, CredentialSource, SecretKind,
};
use crate::usage::http_client::HttpClient;
use crate::usage::types::{Credential, ProviderResult, Service, UsageWindow};

pub const BALANCE_URL: &str = "https://opencode.ai/zen/v1/balance";

const KEY_FIELDS: &[&str] = &["OPENCODE_API_KEY", "apiKey", "api_key"];

const CREDENTIAL_SOURCES: &[CredentialSource] = &[
    CredentialSource::Config(&["OPENCODE_API_KEY"]),
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".config/opencode/config.json"),
        fields: KEY_FIELDS,
    },
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".opencode/config.json"),
        fields: KEY_FIELDS,
    },
];

pub struct OpencodeZenProvider;

impl UsageProvider for OpencodeZenProvider {
    fn service(&self) -> Service {
        Service::OpencodeZen
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
            return ProviderResult::no_credentials(Service::OpencodeZen);
        };

        let headers = [("Authorization", format!("Bearer {}", api_key))];
        let response = match http.get(BALANCE_URL, &headers) {
            Ok(response) => response,
            Err(e) => return transport_error(Service::OpencodeZen, &e),
        };

        match response.status {
            200 => match response.body.json() {
                Some(json) => parse_balance(json),
                None => unexpected_body(Service::OpencodeZen, &response.body),
            },
            401 => ProviderResult::error(
                Service::OpencodeZen,
                "Invalid API key",
                Some("Check OPENCODE_API_KEY".to_string()),
            ),
            _ => status_error(
                Service::OpencodeZen,
                &response,
                "OpenCode Zen balance endpoint returned an error",
            ),
        }
    }
}

fn parse_balance(json: &serde_json::Value) -> ProviderResult {
    let mut result = ProviderResult::ok(Service::OpencodeZen);
    let balance = number_at(json, "balance")
        .or_else(|| number_at(&json["data"], "balance"))
        .or_else(|| number_at(json, "credits"));
    let Some(balance) = balance else {
        return result;
    };

    let used = number_at(json, "used")
        .or_else(|| number_at(json, "spent"))
        .unwrap_or(0.0);
    // No total is exposed, so there is no meaningful percentage.
    result.five_hour = Some(UsageWindow::from_balance(used, balance, 0.0));
    result
}
