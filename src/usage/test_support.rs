//! Shared fixtures for usage tests: a recording HTTP stub and config helpers.

use super::http_client::{HttpClient, HttpResponse, ResponseBody};
use crate::config::{ConfigSource, HostSettings};
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone)]
enum Route {
    Respond(HttpResponse),
    Fail(String),
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Canned responses keyed by URL. Unrouted URLs fail like a dead network.
#[derive(Default)]
pub struct StubHttp {
    routes: HashMap<String, Route>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, url: &str, status: u16, body: serde_json::Value) -> Self {
        self.routes.insert(
            url.to_string(),
            Route::Respond(HttpResponse {
                status,
                body: ResponseBody::Json(body),
            }),
        );
        self
    }

    pub fn text(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            Route::Respond(HttpResponse {
                status,
                body: ResponseBody::Text(body.to_string()),
            }),
        );
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.routes
            .insert(url.to_string(), Route::Fail(message.to_string()));
        self
    }

    /// Blocks requests to `url` for `delay` before answering.
    pub fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.url.clone()).collect()
    }
}

impl HttpClient for StubHttp {
    fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse> {
        self.calls.lock().push(RecordedCall {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect(),
        });

        if let Some(delay) = self.delays.get(url) {
            std::thread::sleep(*delay);
        }

        match self.routes.get(url) {
            Some(Route::Respond(response)) => Ok(response.clone()),
            Some(Route::Fail(message)) => Err(anyhow!("{}", message)),
            None => Err(anyhow!("connection refused: {}", url)),
        }
    }
}

/// Config with a fixed environment layer and nothing else.
pub fn env_config(pairs: &[(&str, &str)]) -> ConfigSource {
    ConfigSource::from_layers(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        HashMap::new(),
        HostSettings::default(),
    )
}

/// Writes `content` to `relative` under `root`, creating parent directories.
pub fn write_file(root: &std::path::Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
