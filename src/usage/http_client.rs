//! Blocking HTTP access for provider fetchers.

use anyhow::{Context, Result};
use std::time::Duration;

/// Response body, parsed as JSON when possible and kept verbatim otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    pub fn parse(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(json) => ResponseBody::Json(json),
            Err(_) => ResponseBody::Text(raw),
        }
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(json) => Some(json),
            ResponseBody::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: ResponseBody,
}

/// Performs a GET request. Non-2xx statuses are responses, not errors; only
/// transport failures are `Err`.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse>;
}

/// `ureq`-backed client used in production.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse> {
        let mut request = self.agent.get(url).header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let mut response = request
            .call()
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status().as_u16();
        let raw = response
            .body_mut()
            .read_to_string()
            .context("Failed to read response body")?;

        Ok(HttpResponse {
            status,
            body: ResponseBody::parse(raw),
        })
    }
}
