//! Refresh orchestration, observable state and host events.
//!
//! The coordinator owns the only mutable state in the plugin. It serves the
//! cache first (stale-while-revalidate), runs at most one unforced refresh at
//! a time, and reports every change twice: as a [`UsageState`] snapshot on a
//! `watch` channel and as a [`UsageEvent`] on an unbounded queue.

use super::fetcher::UsageFetcher;
use super::store::{is_stale, CacheStore};
use super::types::{Payload, ProviderResult};
use crate::config::ConfigSource;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const PAYLOAD_ERROR: &str = "Usage data unavailable";

/// Events delivered to the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum UsageEvent {
    UsageUpdated { data: Vec<ProviderResult> },
    UsageError { message: String },
    PanelToggled { visible: bool },
}

/// Commands accepted from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostCommand {
    Refresh,
    Toggle,
}

impl std::str::FromStr for HostCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "refresh" => Ok(HostCommand::Refresh),
            "toggle" => Ok(HostCommand::Toggle),
            other => anyhow::bail!("Unknown command: {:?}", other),
        }
    }
}

/// Snapshot of everything the UI renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageState {
    pub data: Vec<ProviderResult>,
    pub fetched_at_ms: i64,
    pub loading: bool,
    pub last_error: Option<String>,
    pub panel_visible: bool,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    /// Another refresh was already running.
    Skipped,
    Completed(Payload),
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// A fresh cache was applied; nothing was fetched.
    Fresh(Payload),
    /// A stale cache was applied and a background refresh started.
    Revalidating {
        cached: Payload,
        refresh: JoinHandle<RefreshOutcome>,
    },
    /// No usable cache; a refresh ran inline.
    Fetched(RefreshOutcome),
}

pub struct RefreshCoordinator {
    fetcher: UsageFetcher,
    store: CacheStore,
    config: Mutex<ConfigSource>,
    loading: AtomicBool,
    state_tx: watch::Sender<UsageState>,
    event_tx: mpsc::UnboundedSender<UsageEvent>,
}

/// Clears the loading flag when a refresh ends, including by panic.
struct LoadingGuard<'a> {
    loading: &'a AtomicBool,
    state_tx: &'a watch::Sender<UsageState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.loading.store(false, Ordering::SeqCst);
        self.state_tx.send_modify(|state| state.loading = false);
    }
}

impl RefreshCoordinator {
    pub fn new(
        fetcher: UsageFetcher,
        store: CacheStore,
        config: ConfigSource,
        event_tx: mpsc::UnboundedSender<UsageEvent>,
    ) -> Self {
        let (state_tx, _) = watch::channel(UsageState::default());
        Self {
            fetcher,
            store,
            config: Mutex::new(config),
            loading: AtomicBool::new(false),
            state_tx,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UsageState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> UsageState {
        self.state_tx.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Fetches all providers, publishes the result and rewrites the cache.
    ///
    /// Returns `Skipped` without doing anything if a refresh is already in
    /// flight and `force` is false.
    pub async fn refresh_usage(&self, force: bool) -> RefreshOutcome {
        let was_loading = self.loading.swap(true, Ordering::SeqCst);
        if was_loading && !force {
            tracing::debug!("Refresh already in progress, skipping");
            return RefreshOutcome::Skipped;
        }

        let _guard = LoadingGuard {
            loading: &self.loading,
            state_tx: &self.state_tx,
        };
        self.state_tx.send_modify(|state| state.loading = true);
        tracing::info!("Refreshing usage (force={})", force);

        let snapshot = {
            let mut config = self.config.lock();
            config.reload_dotenv();
            Arc::new(config.clone())
        };

        let payload = self.fetcher.run(snapshot).await;
        self.apply_payload(&payload);
        self.store.write(&payload);
        RefreshOutcome::Completed(payload)
    }

    /// Publishes a payload to observers.
    pub fn apply_payload(&self, payload: &Payload) {
        if !payload.ok {
            tracing::warn!("Received a payload marked not ok");
            self.state_tx
                .send_modify(|state| state.last_error = Some(PAYLOAD_ERROR.to_string()));
            self.emit(UsageEvent::UsageError {
                message: PAYLOAD_ERROR.to_string(),
            });
            return;
        }

        self.state_tx.send_modify(|state| {
            state.data = payload.data.clone();
            state.fetched_at_ms = payload.fetched_at_ms;
            state.last_error = None;
        });
        self.emit(UsageEvent::UsageUpdated {
            data: payload.data.clone(),
        });
    }

    /// Serves the cache if there is one, revalidating it in the background
    /// when stale. Without a cache, refreshes inline.
    pub async fn load_cache(self: &Arc<Self>) -> LoadOutcome {
        let Some(cached) = self.store.read() else {
            tracing::debug!("No usable cache at {}", self.store.path().display());
            return LoadOutcome::Fetched(self.refresh_usage(true).await);
        };

        self.apply_payload(&cached);
        if !is_stale(&cached) {
            return LoadOutcome::Fresh(cached);
        }

        tracing::debug!("Cache is stale, revalidating in background");
        let coordinator = Arc::clone(self);
        let refresh = tokio::spawn(async move { coordinator.refresh_usage(true).await });
        LoadOutcome::Revalidating { cached, refresh }
    }

    pub async fn handle_command(&self, command: HostCommand) {
        match command {
            HostCommand::Refresh => {
                self.refresh_usage(true).await;
            }
            HostCommand::Toggle => {
                let mut visible = false;
                self.state_tx.send_modify(|state| {
                    state.panel_visible = !state.panel_visible;
                    visible = state.panel_visible;
                });
                self.emit(UsageEvent::PanelToggled { visible });
            }
        }
    }

    fn emit(&self, event: UsageEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
