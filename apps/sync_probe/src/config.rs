use std::{collections::HashMap, fs, path::Path};

use client_core::config::DEFAULT_API_BASE_URL;

pub const SETTINGS_FILE: &str = "sync_probe.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            token: None,
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the toml file, then environment. Later layers win.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_base_url") {
                settings.api_base_url = v.clone();
            }
        }
    }

    if let Some(v) = env("REALTIME_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("REALTIME_TOKEN") {
        settings.token = Some(v);
    }
    if let Some(v) = env("APP__TOKEN") {
        settings.token = Some(v);
    }
    settings.token = settings.token.filter(|token| !token.trim().is_empty());

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
