//! Fans out one fetch per provider and joins them into a single payload.

use super::credentials::CredentialContext;
use super::http_client::{HttpClient, UreqClient};
use super::providers::{default_providers, run_provider, UsageProvider};
use super::types::{FetchStatus, Payload, ProviderResult};
use crate::config::ConfigSource;
use crate::usage_reset::now_ms;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Largest number of sequential HTTP calls one provider makes (codex: OAuth
/// usage, then the API-key check).
const MAX_CALLS_PER_PROVIDER: u32 = 2;

/// Per-request HTTP timeout for a given per-provider job budget.
///
/// Leaves one slot of headroom beyond the longest call chain, so a hung first
/// call still leaves time for the fallback before the job deadline.
pub fn request_timeout(fetch_timeout: Duration) -> Duration {
    fetch_timeout / (MAX_CALLS_PER_PROVIDER + 1)
}

/// Runs every provider concurrently on the blocking pool.
pub struct UsageFetcher {
    providers: Vec<Arc<dyn UsageProvider>>,
    http: Arc<dyn HttpClient>,
    home: Option<PathBuf>,
    fetch_timeout: Duration,
}

impl UsageFetcher {
    pub fn new(
        providers: Vec<Arc<dyn UsageProvider>>,
        http: Arc<dyn HttpClient>,
        home: Option<PathBuf>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            providers,
            http,
            home,
            fetch_timeout,
        }
    }

    /// The built-in providers over real HTTP, reading credentials from the
    /// user's home directory.
    pub fn with_defaults(fetch_timeout: Duration) -> Self {
        Self::new(
            default_providers(),
            Arc::new(UreqClient::new(request_timeout(fetch_timeout))),
            dirs::home_dir(),
            fetch_timeout,
        )
    }

    /// Fetches every provider and returns once all have settled.
    ///
    /// Always yields exactly one result per provider, sorted by service name.
    pub async fn run(&self, config: Arc<ConfigSource>) -> Payload {
        let jobs = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let http = Arc::clone(&self.http);
            let home = self.home.clone();
            let config = Arc::clone(&config);
            let fetch_timeout = self.fetch_timeout;

            async move {
                let service = provider.service();
                let task = tokio::task::spawn_blocking(move || {
                    let ctx = CredentialContext {
                        config: &config,
                        home: home.as_deref(),
                    };
                    run_provider(provider.as_ref(), &ctx, http.as_ref(), now_ms())
                });

                // A timed-out task keeps its blocking thread until the HTTP
                // client's request timeout fires; its result is discarded.
                match tokio::time::timeout(fetch_timeout, task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        tracing::warn!("{}: fetch task failed: {}", service, e);
                        ProviderResult::error(service, "Fetch task failed", Some(e.to_string()))
                    }
                    Err(_) => {
                        tracing::warn!(
                            "{}: no response within {}s",
                            service,
                            fetch_timeout.as_secs_f64()
                        );
                        ProviderResult::error(
                            service,
                            "Request timed out",
                            Some(format!(
                                "No response within {}s",
                                fetch_timeout.as_secs_f64()
                            )),
                        )
                    }
                }
            }
        });

        let results = join_all(jobs).await;
        let payload = Payload::new(now_ms(), results);
        tracing::info!(
            "Fetched usage for {} providers ({} ok)",
            payload.data.len(),
            payload
                .data
                .iter()
                .filter(|r| r.status == FetchStatus::Ok)
                .count()
        );
        payload
    }
}

#[cfg(test)]
#[path = "tests/fetcher_tests.rs"]
mod tests;
