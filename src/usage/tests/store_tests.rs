use super::*;
use crate::usage::types::{ProviderResult, Service, UsageWindow};
use tempfile::TempDir;

fn sample_payload(fetched_at_ms: i64) -> Payload {
    let mut openrouter =
        ProviderResult::ok(Service::Openrouter).with_source("env:OPENROUTER_API_KEY");
    openrouter.five_hour = Some(UsageWindow::from_balance(3.0, 7.0, 30.0));
    Payload::new(
        fetched_at_ms,
        vec![
            openrouter,
            ProviderResult::no_credentials(Service::Claude),
            ProviderResult::error(Service::Zai, "HTTP 500", Some("try later".to_string())),
        ],
    )
}

#[test]
fn test_missing_cache_reads_none() {
    let temp_dir = TempDir::new().unwrap();
    let store = CacheStore::in_dir(temp_dir.path());
    assert!(store.read().is_none());
}

#[test]
fn test_write_creates_parent_and_reads_back() {
    let temp_dir = TempDir::new().unwrap();
    let store = CacheStore::in_dir(&temp_dir.path().join("nested/plugin"));
    let payload = sample_payload(1_700_000_000_000);

    store.write(&payload);

    assert!(store.path().exists());
    assert_eq!(store.read(), Some(payload));
}

#[test]
fn test_cache_file_uses_camel_case_keys() {
    let temp_dir = TempDir::new().unwrap();
    let store = CacheStore::in_dir(temp_dir.path());
    store.write(&sample_payload(42));

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["fetchedAtMs"], 42);
    assert_eq!(json["data"][1]["fiveHour"]["remaining"], "$7.00");
    assert_eq!(json["data"][0]["status"], "no_credentials");
}

#[test]
fn test_corrupt_cache_is_a_miss() {
    let temp_dir = TempDir::new().unwrap();
    let store = CacheStore::in_dir(temp_dir.path());

    std::fs::write(store.path(), "{not json").unwrap();
    assert!(store.read().is_none());

    std::fs::write(store.path(), r#"{"ok": true}"#).unwrap();
    assert!(store.read().is_none(), "missing data");

    std::fs::write(store.path(), r#"{"data": []}"#).unwrap();
    assert!(store.read().is_none(), "missing ok");
}

#[test]
fn test_missing_timestamp_reads_as_zero_and_stale() {
    let temp_dir = TempDir::new().unwrap();
    let store = CacheStore::in_dir(temp_dir.path());
    std::fs::write(store.path(), r#"{"ok": true, "data": []}"#).unwrap();

    let payload = store.read().unwrap();
    assert_eq!(payload.fetched_at_ms, 0);
    assert!(is_stale(&payload));
}

#[test]
fn test_staleness_threshold() {
    let now = 10_000_000;
    assert!(!is_stale_at(&sample_payload(now), now));
    assert!(!is_stale_at(&sample_payload(now - STALE_CACHE_MS + 1), now));
    assert!(is_stale_at(&sample_payload(now - STALE_CACHE_MS), now));
    assert!(is_stale_at(&sample_payload(now - 10 * STALE_CACHE_MS), now));
}

#[test]
fn test_write_failure_is_swallowed() {
    let temp_dir = TempDir::new().unwrap();
    // A directory where the cache file should be makes the write fail.
    let store = CacheStore::in_dir(temp_dir.path());
    std::fs::create_dir_all(store.path()).unwrap();

    store.write(&sample_payload(1));
    assert!(store.read().is_none());
}
