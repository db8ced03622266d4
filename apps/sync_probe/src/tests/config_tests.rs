use super::*;

use std::{
    collections::HashMap,
    env, fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_settings_file(contents: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("sync_probe_{nanos}.toml"));
    fs::write(&path, contents).expect("write settings");
    path
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_without_file_or_env() {
    let settings = load_settings_from(Path::new("/nonexistent/sync_probe.toml"), env_from(&[]));
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.api_base_url, "http://localhost:8080");
}

#[test]
fn file_overrides_defaults() {
    let path = temp_settings_file("api_base_url = \"https://chat.example.com\"\n");

    let settings = load_settings_from(&path, env_from(&[]));

    assert_eq!(settings.api_base_url, "https://chat.example.com");
    fs::remove_file(path).expect("cleanup");
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let path = temp_settings_file("api_base_url = \"https://file.example.com\"\n");

    let settings = load_settings_from(
        &path,
        env_from(&[
            ("REALTIME_API_URL", "https://env.example.com"),
            ("APP__API_BASE_URL", "https://app.example.com"),
            ("REALTIME_TOKEN", "bearer-1"),
        ]),
    );

    assert_eq!(settings.api_base_url, "https://app.example.com");
    assert_eq!(settings.token.as_deref(), Some("bearer-1"));
    fs::remove_file(path).expect("cleanup");
}

#[test]
fn blank_token_counts_as_missing() {
    let settings = load_settings_from(
        Path::new("/nonexistent/sync_probe.toml"),
        env_from(&[("APP__TOKEN", "  ")]),
    );
    assert!(settings.token.is_none());
}
