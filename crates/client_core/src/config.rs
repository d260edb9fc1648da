use std::{
    collections::HashMap,
    fs,
    path::Path,
};

use serde::Deserialize;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client configuration. The backend URL is injected rather than baked in;
/// see [`load_settings`] for the override chain.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub backend_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Defaults, then `detector.toml` in the working directory, then environment
/// variables. Later sources win.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new("detector.toml"), |key| std::env::var(key).ok())
}

fn load_settings_from(config_path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            if let Some(v) = file_cfg.get("backend_url").and_then(|v| v.as_str()) {
                settings.backend_url = v.to_string();
            }
            if let Some(v) = file_cfg
                .get("request_timeout_secs")
                .and_then(|v| v.as_integer())
            {
                if v > 0 {
                    settings.request_timeout_secs = v as u64;
                }
            }
        }
    }

    if let Some(v) = env("DETECTOR_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = env("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    settings
}

/// Trim whitespace and any trailing slashes so endpoint paths can be
/// appended verbatim.
pub fn normalize_backend_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_BACKEND_URL.to_string();
    }
    trimmed.trim_end_matches('/').to_string()
}
