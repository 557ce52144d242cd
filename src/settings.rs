use log::debug;
use serde::{Deserialize, Serialize};
use std::env;

// Environment variables consulted on every call so a key exported after launch still applies
const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];
const BASE_URL_ENV: &str = "SAHAYAK_GEMINI_BASE_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    /// Pinned "current date" string handed to the research prompt.
    #[serde(default = "default_date_context")]
    pub date_context: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_debug_mode")]
    pub debug_mode: bool,
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_generation_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_transcription_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_date_context() -> String {
    "February 21, 2026".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_debug_mode() -> bool {
    false
}

impl Default for AppSettings {
    fn default() -> Self {
        get_default_settings()
    }
}

pub fn get_default_settings() -> AppSettings {
    AppSettings {
        api_key: None,
        api_base_url: default_api_base_url(),
        generation_model: default_generation_model(),
        transcription_model: default_transcription_model(),
        date_context: default_date_context(),
        request_timeout_secs: default_request_timeout_secs(),
        debug_mode: default_debug_mode(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppSettings {
    /// Resolve the API key given an environment lookup. Environment wins over the stored key.
    pub fn api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        for var in API_KEY_ENV_VARS {
            if let Some(key) = non_blank(lookup(var)) {
                debug!("Using API key from environment variable {}", var);
                return Some(key);
            }
        }
        non_blank(self.api_key.clone())
    }

    pub fn base_url_with<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_blank(lookup(BASE_URL_ENV)) {
            debug!(
                "Using base URL from environment variable {}: {}",
                BASE_URL_ENV, url
            );
            return url.trim_end_matches('/').to_string();
        }
        self.api_base_url.trim().trim_end_matches('/').to_string()
    }

    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key_with(|name| env::var(name).ok())
    }

    pub fn effective_base_url(&self) -> String {
        self.base_url_with(|name| env::var(name).ok())
    }
}

#[cfg(feature = "desktop")]
pub use store::{get_settings, load_or_create_app_settings, write_settings};

#[cfg(feature = "desktop")]
mod store {
    use super::{get_default_settings, AppSettings};
    use tauri::{App, AppHandle};
    use tauri_plugin_store::StoreExt;

    pub const SETTINGS_STORE_PATH: &str = "settings_store.json";

    pub fn load_or_create_app_settings(app: &App) -> AppSettings {
        let store = match app.store(SETTINGS_STORE_PATH) {
            Ok(store) => store,
            Err(e) => {
                log::error!("Failed to initialize settings store: {}", e);
                return get_default_settings();
            }
        };

        if let Some(settings_value) = store.get("settings") {
            match serde_json::from_value::<AppSettings>(settings_value) {
                Ok(settings) => {
                    log::debug!("Found existing settings");
                    return settings;
                }
                Err(e) => log::warn!("Failed to parse settings: {}", e),
            }
        }

        let default_settings = get_default_settings();
        match serde_json::to_value(&default_settings) {
            Ok(value) => store.set("settings", value),
            Err(e) => log::error!("Failed to serialize default settings: {}", e),
        }
        default_settings
    }

    pub fn get_settings(app: &AppHandle) -> AppSettings {
        let store = match app.store(SETTINGS_STORE_PATH) {
            Ok(store) => store,
            Err(e) => {
                log::error!("Failed to initialize settings store: {}", e);
                return get_default_settings();
            }
        };

        store
            .get("settings")
            .and_then(|value| serde_json::from_value::<AppSettings>(value).ok())
            .unwrap_or_else(get_default_settings)
    }

    pub fn write_settings(app: &AppHandle, settings: &AppSettings) -> Result<(), String> {
        let store = app
            .store(SETTINGS_STORE_PATH)
            .map_err(|e| format!("Failed to initialize settings store: {}", e))?;
        let value = serde_json::to_value(settings)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        store.set("settings", value);
        Ok(())
    }
}
