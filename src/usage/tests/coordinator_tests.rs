use super::*;
use crate::usage::providers::{default_providers, openrouter};
use crate::usage::test_support::{env_config, StubHttp};
use crate::usage::types::{FetchStatus, Service};
use crate::usage_reset::now_ms;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    coordinator: Arc<RefreshCoordinator>,
    events: mpsc::UnboundedReceiver<UsageEvent>,
    http: Arc<StubHttp>,
    dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let http = Arc::new(StubHttp::new().json(
        openrouter::CREDITS_URL,
        200,
        serde_json::json!({"data": {"total_credits": 10, "total_usage": 3}}),
    ));
    let fetcher = UsageFetcher::new(
        default_providers(),
        http.clone(),
        Some(dir.path().join("home")),
        Duration::from_secs(5),
    );
    let (event_tx, events) = mpsc::unbounded_channel();
    let coordinator = Arc::new(RefreshCoordinator::new(
        fetcher,
        CacheStore::in_dir(dir.path()),
        env_config(&[("OPENROUTER_API_KEY", "or-key")]),
        event_tx,
    ));
    Harness {
        coordinator,
        events,
        http,
        dir,
    }
}

fn cached_payload(fetched_at_ms: i64) -> Payload {
    Payload::new(
        fetched_at_ms,
        vec![ProviderResult::error(
            Service::Claude,
            "cached marker",
            None,
        )],
    )
}

#[tokio::test]
async fn test_fresh_cache_makes_no_requests() {
    let mut h = harness();
    let cached = cached_payload(now_ms());
    CacheStore::in_dir(h.dir.path()).write(&cached);

    let outcome = h.coordinator.load_cache().await;

    assert!(matches!(outcome, LoadOutcome::Fresh(ref p) if *p == cached));
    assert!(h.http.call_urls().is_empty());
    assert_eq!(h.coordinator.state().data, cached.data);
    assert_eq!(
        h.events.try_recv().unwrap(),
        UsageEvent::UsageUpdated { data: cached.data }
    );
}

#[tokio::test]
async fn test_stale_cache_applied_then_revalidated() {
    let mut h = harness();
    let cached = cached_payload(now_ms() - 2 * crate::usage::store::STALE_CACHE_MS);
    CacheStore::in_dir(h.dir.path()).write(&cached);

    let outcome = h.coordinator.load_cache().await;
    let LoadOutcome::Revalidating { cached: served, refresh } = outcome else {
        panic!("expected background revalidation");
    };
    assert_eq!(served, cached);
    assert_eq!(
        h.events.recv().await.unwrap(),
        UsageEvent::UsageUpdated {
            data: cached.data.clone()
        }
    );

    let RefreshOutcome::Completed(fresh) = refresh.await.unwrap() else {
        panic!("forced refresh must not be skipped");
    };
    assert_eq!(fresh.data.len(), 5);
    assert_eq!(h.http.call_urls(), vec![openrouter::CREDITS_URL]);
    assert!(matches!(
        h.events.recv().await.unwrap(),
        UsageEvent::UsageUpdated { ref data } if data.len() == 5
    ));

    let rewritten = CacheStore::in_dir(h.dir.path()).read().unwrap();
    assert_eq!(rewritten, fresh);
    assert!(!crate::usage::store::is_stale(&rewritten));
}

#[tokio::test]
async fn test_missing_cache_refreshes_inline() {
    let h = harness();

    let outcome = h.coordinator.load_cache().await;

    let LoadOutcome::Fetched(RefreshOutcome::Completed(payload)) = outcome else {
        panic!("expected an inline refresh");
    };
    let openrouter = payload
        .data
        .iter()
        .find(|r| r.service == Service::Openrouter)
        .unwrap();
    assert_eq!(openrouter.status, FetchStatus::Ok);
    assert_eq!(openrouter.five_hour.as_ref().unwrap().used, "$3.00");

    let state = h.coordinator.state();
    assert_eq!(state.data, payload.data);
    assert_eq!(state.fetched_at_ms, payload.fetched_at_ms);
    assert!(!state.loading);
    assert!(CacheStore::in_dir(h.dir.path()).read().is_some());
}

#[tokio::test]
async fn test_unforced_refresh_skipped_while_loading() {
    let h = harness();
    h.coordinator.loading.store(true, Ordering::SeqCst);

    assert!(matches!(
        h.coordinator.refresh_usage(false).await,
        RefreshOutcome::Skipped
    ));
    assert!(h.http.call_urls().is_empty());

    assert!(matches!(
        h.coordinator.refresh_usage(true).await,
        RefreshOutcome::Completed(_)
    ));
    assert!(!h.coordinator.is_loading());
}

#[tokio::test]
async fn test_loading_state_published() {
    let h = harness();
    let mut state_rx = h.coordinator.subscribe();

    h.coordinator.refresh_usage(false).await;

    assert!(state_rx.has_changed().unwrap());
    let state = state_rx.borrow_and_update().clone();
    assert!(!state.loading);
    assert_eq!(state.data.len(), 5);
}

#[tokio::test]
async fn test_toggle_flips_panel_and_emits() {
    let mut h = harness();

    h.coordinator.handle_command(HostCommand::Toggle).await;
    assert!(h.coordinator.state().panel_visible);
    assert_eq!(
        h.events.try_recv().unwrap(),
        UsageEvent::PanelToggled { visible: true }
    );

    h.coordinator.handle_command(HostCommand::Toggle).await;
    assert!(!h.coordinator.state().panel_visible);
    assert_eq!(
        h.events.try_recv().unwrap(),
        UsageEvent::PanelToggled { visible: false }
    );
    assert!(h.http.call_urls().is_empty());
}

#[tokio::test]
async fn test_refresh_command_forces_fetch() {
    let h = harness();
    h.coordinator.loading.store(true, Ordering::SeqCst);

    h.coordinator.handle_command(HostCommand::Refresh).await;

    assert_eq!(h.http.call_urls(), vec![openrouter::CREDITS_URL]);
}

#[test]
fn test_payload_not_ok_reports_error() {
    let mut h = harness();
    let mut payload = cached_payload(1);
    payload.ok = false;

    h.coordinator.apply_payload(&payload);

    let state = h.coordinator.state();
    assert_eq!(state.last_error.as_deref(), Some("Usage data unavailable"));
    assert!(state.data.is_empty());
    assert!(matches!(
        h.events.try_recv().unwrap(),
        UsageEvent::UsageError { .. }
    ));
}

#[test]
fn test_event_wire_format() {
    let toggled = serde_json::to_value(UsageEvent::PanelToggled { visible: true }).unwrap();
    assert_eq!(
        toggled,
        serde_json::json!({"event": "panelToggled", "visible": true})
    );

    let updated = serde_json::to_value(UsageEvent::UsageUpdated {
        data: vec![ProviderResult::no_credentials(Service::Zai)],
    })
    .unwrap();
    assert_eq!(updated["event"], "usageUpdated");
    assert_eq!(updated["data"][0]["status"], "no_credentials");
}

#[test]
fn test_parse_host_commands() {
    assert_eq!("refresh".parse::<HostCommand>().unwrap(), HostCommand::Refresh);
    assert_eq!(" toggle\n".parse::<HostCommand>().unwrap(), HostCommand::Toggle);
    assert!("explode".parse::<HostCommand>().is_err());
}
