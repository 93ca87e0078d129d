//! z.ai (Zhipu) coding plan quota.

use super::{body_hint, number_at, status_error, transport_error, unexpected_body, UsageProvider};
use crate::usage::credentials::{
    json_string_at, resolve_chain, CredentialContext, CredentialFile, CredentialSource,
    SecretKind,
};
use crate::usage::http_client::HttpClient;
use crate::usage::types::{Credential, ProviderResult, Service, UsageWindow};
use crate::usage_reset::ResetTimestamp;

pub const QUOTA_URL: &str = "https://api.z.ai/api/monitor/usage/quota/limit";

const KEY_FIELDS: &[&str] = &["apiKey", "api_key"];

const CREDENTIAL_SOURCES: &[CredentialSource] = &[
    CredentialSource::Config(&["ZAI_API_KEY", "ZAI_KEY", "ZHIPU_API_KEY", "ZHIPUAI_API_KEY"]),
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".zai/config.json"),
        fields: KEY_FIELDS,
    },
    CredentialSource::JsonFile {
        file: CredentialFile::Home(".config/zai/config.json"),
        fields: KEY_FIELDS,
    },
];

pub struct ZaiProvider;

impl UsageProvider for ZaiProvider {
    fn service(&self) -> Service {
        Service::Zai
    }

    fn resolve(&self, ctx: &CredentialContext<'_>) -> Option<Credential> {
        resolve_chain(CREDENTIAL_SOURCES, SecretKind::ApiKey, ctx)
    }

    fn fetch(
        &self,
        credential: &Credential,
        http: &dyn HttpClient,
        now_ms: i64,
    ) -> ProviderResult {
        let Some(api_key) = credential.bearer() else {
            return ProviderResult::no_credentials(Service::Zai);
        };

        // z.ai takes the raw key, no "Bearer" prefix.
        let headers = [("Authorization", api_key.to_string())];
        let response = match http.get(QUOTA_URL, &headers) {
            Ok(response) => response,
            Err(e) => return transport_error(Service::Zai, &e),
        };

        match response.status {
            200 => match response.body.json() {
                Some(json) if json["success"] == serde_json::Value::Bool(false) => {
                    ProviderResult::error(
                        Service::Zai,
                        "Request rejected",
                        body_hint(&response.body),
                    )
                }
                Some(json) => parse_quota(json, now_ms),
                None => unexpected_body(Service::Zai, &response.body),
            },
            401 => ProviderResult::error(
                Service::Zai,
                "Invalid API key",
                Some("Check ZAI_API_KEY".to_string()),
            ),
            _ => status_error(Service::Zai, &response, "z.ai quota endpoint returned an error"),
        }
    }
}

fn parse_quota(json: &serde_json::Value, now_ms: i64) -> ProviderResult {
    let limits = json["data"]["limits"]
        .as_array()
        .or_else(|| json["limits"].as_array());

    let mut result = ProviderResult::ok(Service::Zai);
    for limit in limits.into_iter().flatten() {
        match limit["type"].as_str() {
            Some("TOKENS_LIMIT") => result.five_hour = Some(parse_limit(limit, now_ms)),
            Some("TIME_LIMIT") => result.seven_day = Some(parse_limit(limit, now_ms)),
            _ => {}
        }
    }
    result.plan = json_string_at(json, "data.planName")
        .or_else(|| json_string_at(json, "data.level"))
        .map(String::from);
    result
}

fn parse_limit(limit: &serde_json::Value, now_ms: i64) -> UsageWindow {
    let used_percent = number_at(limit, "percentage").unwrap_or(0.0);
    let reset = number_at(limit, "nextResetTime")
        .filter(|ms| *ms > 0.0)
        .map(|ms| ResetTimestamp::from_epoch_ms(ms as i64));
    UsageWindow::from_percent(used_percent, reset, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::test_support::{env_config, StubHttp};
    use crate::usage::types::FetchStatus;

    #[test]
    fn test_tokens_limit_maps_to_five_hour() {
        let now = 1_700_000_000_000;
        let json = serde_json::json!({
            "code": 200,
            "success": true,
            "data": {
                "planName": "Lite",
                "limits": [
                    {"type": "TOKENS_LIMIT", "percentage": 42, "nextResetTime": now + 3_600_000}
                ]
            }
        });

        let result = parse_quota(&json, now);
        let five = result.five_hour.unwrap();
        assert_eq!(five.used, "42%");
        assert_eq!(five.resets_in, "1h 0m");
        assert!(result.seven_day.is_none());
        assert_eq!(result.plan.as_deref(), Some("Lite"));
    }

    #[test]
    fn test_top_level_limits_and_missing_numbers() {
        let json = serde_json::json!({
            "limits": [{"type": "TIME_LIMIT"}, {"type": "UNKNOWN", "percentage": 99}],
            "data": {"level": "pro"}
        });

        let result = parse_quota(&json, 0);
        assert!(result.five_hour.is_none());
        let seven = result.seven_day.unwrap();
        assert_eq!(seven.used, "0%");
        assert_eq!(seven.resets_in, "");
        assert_eq!(result.plan.as_deref(), Some("pro"));
    }

    #[test]
    fn test_success_false_uses_msg_as_hint() {
        let http = StubHttp::new().json(
            QUOTA_URL,
            200,
            serde_json::json!({"success": false, "msg": "Authorization token expired"}),
        );
        let credential = Credential::api_key("k", "test");

        let result = ZaiProvider.fetch(&credential, &http, 0);
        assert_eq!(result.status, FetchStatus::Error);
        assert_eq!(result.hint.as_deref(), Some("Authorization token expired"));
    }

    #[test]
    fn test_raw_key_in_authorization_header() {
        let http = StubHttp::new().json(QUOTA_URL, 200, serde_json::json!({"data": {}}));
        let credential = Credential::api_key("zai-key", "test");

        let result = ZaiProvider.fetch(&credential, &http, 0);
        assert_eq!(result.status, FetchStatus::Ok);
        assert_eq!(http.calls()[0].header("Authorization"), Some("zai-key"));
    }

    #[test]
    fn test_aliases_tried_in_order() {
        let config = env_config(&[("ZHIPUAI_API_KEY", "fourth"), ("ZAI_KEY", "second")]);
        let ctx = CredentialContext {
            config: &config,
            home: None,
        };

        let credential = ZaiProvider.resolve(&ctx).unwrap();
        assert_eq!(credential.bearer(), Some("second"));
        assert_eq!(credential.source, "env:ZAI_KEY");
    }
}
