use super::*;
use serial_test::serial;

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_env_wins_over_dotenv_and_settings() {
    let settings = HostSettings {
        openrouter_api_key: Some("from-settings".to_string()),
        ..Default::default()
    };
    let source = ConfigSource::from_layers(
        map(&[("OPENROUTER_API_KEY", "from-env")]),
        map(&[("OPENROUTER_API_KEY", "from-dotenv")]),
        settings,
    );

    assert_eq!(
        source.lookup("OPENROUTER_API_KEY"),
        Some(("from-env".to_string(), ConfigLayer::Env))
    );
}

#[test]
fn test_empty_values_fall_through() {
    let settings = HostSettings {
        openrouter_api_key: Some("from-settings".to_string()),
        ..Default::default()
    };
    let source = ConfigSource::from_layers(
        map(&[("OPENROUTER_API_KEY", "")]),
        map(&[("OPENROUTER_API_KEY", "")]),
        settings,
    );

    assert_eq!(
        source.lookup("OPENROUTER_API_KEY"),
        Some(("from-settings".to_string(), ConfigLayer::Settings))
    );
}

#[test]
fn test_dotenv_wins_over_settings() {
    let settings = HostSettings {
        claude_access_token: Some("from-settings".to_string()),
        ..Default::default()
    };
    let source = ConfigSource::from_layers(
        HashMap::new(),
        map(&[("CLAUDE_ACCESS_TOKEN", "from-dotenv")]),
        settings,
    );

    assert_eq!(source.get_env_value("CLAUDE_ACCESS_TOKEN"), "from-dotenv");
}

#[test]
fn test_missing_value_is_empty_string() {
    let source = ConfigSource::from_layers(HashMap::new(), HashMap::new(), HostSettings::default());
    assert_eq!(source.get_env_value("NOT_SET_ANYWHERE"), "");
    assert_eq!(source.lookup("NOT_SET_ANYWHERE"), None);
}

#[test]
fn test_reload_dotenv_picks_up_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    std::fs::write(&path, "USAGE_MONITOR_TEST_RELOAD=one\n").unwrap();

    let mut source = ConfigSource::load(path.clone(), HostSettings::default());
    assert_eq!(source.get_env_value("USAGE_MONITOR_TEST_RELOAD"), "one");

    std::fs::write(&path, "USAGE_MONITOR_TEST_RELOAD=two\n").unwrap();
    source.reload_dotenv();
    assert_eq!(source.get_env_value("USAGE_MONITOR_TEST_RELOAD"), "two");
}

#[test]
#[serial]
fn test_process_env_layer_reads_live_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    std::fs::write(&path, "USAGE_MONITOR_TEST_PROCESS=from-dotenv\n").unwrap();
    let source = ConfigSource::load(path, HostSettings::default());

    std::env::set_var("USAGE_MONITOR_TEST_PROCESS", "from-process");
    let found = source.lookup("USAGE_MONITOR_TEST_PROCESS");
    std::env::remove_var("USAGE_MONITOR_TEST_PROCESS");

    assert_eq!(
        found,
        Some(("from-process".to_string(), ConfigLayer::Env))
    );
    assert_eq!(
        source.lookup("USAGE_MONITOR_TEST_PROCESS"),
        Some(("from-dotenv".to_string(), ConfigLayer::Dotenv))
    );
}
