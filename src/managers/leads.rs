use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Namespaced key the lead list lives under.
pub const LEADS_STORE_KEY: &str = "sahayak_leads_v2";
pub const MAX_LEADS: usize = 10;

/// A remembered past query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub query: String,
    #[serde(rename = "lastGenerated")]
    pub last_generated_at: DateTime<Utc>,
}

/// Durable get/set for the signal history. Last write wins.
pub trait LeadStore: Send + Sync {
    /// Most-recent-first. Absent or corrupt data loads as an empty list.
    fn load(&self) -> Vec<Lead>;
    fn save(&self, leads: &[Lead]) -> Result<()>;
}

/// Put `query` at the front, dropping any older entry with the same text, and
/// keep only the newest `MAX_LEADS`.
pub fn record_lead(leads: &[Lead], query: &str, now: DateTime<Utc>) -> Vec<Lead> {
    let lead = Lead {
        id: now.timestamp_millis().to_string(),
        query: query.to_string(),
        last_generated_at: now,
    };

    std::iter::once(lead)
        .chain(leads.iter().filter(|l| l.query != query).cloned())
        .take(MAX_LEADS)
        .collect()
}

/// Decode a stored value, treating anything that is not a list of leads as empty.
pub fn leads_from_value(value: Value) -> Vec<Lead> {
    match serde_json::from_value::<Vec<Lead>>(value) {
        Ok(mut leads) => {
            leads.truncate(MAX_LEADS);
            leads
        }
        Err(e) => {
            warn!("Ignoring corrupt lead history: {}", e);
            Vec::new()
        }
    }
}

fn capped(leads: &[Lead]) -> &[Lead] {
    &leads[..leads.len().min(MAX_LEADS)]
}

/// Lead history kept as a JSON array in a single file.
pub struct JsonFileLeadStore {
    path: PathBuf,
}

impl JsonFileLeadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/sahayak_leads_v2.json`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir.into().join(format!("{}.json", LEADS_STORE_KEY)))
    }
}

impl LeadStore for JsonFileLeadStore {
    fn load(&self) -> Vec<Lead> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No lead history at {:?}: {}", self.path, e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => leads_from_value(value),
            Err(e) => {
                warn!("Lead history at {:?} is not valid JSON: {}", self.path, e);
                Vec::new()
            }
        }
    }

    fn save(&self, leads: &[Lead]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(capped(leads))?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write lead history to {:?}", self.path))?;
        Ok(())
    }
}

#[cfg(feature = "desktop")]
pub use tauri_store::TauriLeadStore;

#[cfg(feature = "desktop")]
mod tauri_store {
    use super::{capped, leads_from_value, Lead, LeadStore, LEADS_STORE_KEY};
    use anyhow::{anyhow, Result};
    use tauri::AppHandle;
    use tauri_plugin_store::StoreExt;

    pub const LEADS_STORE_PATH: &str = "leads_store.json";

    /// Lead history in the app's tauri-plugin-store file.
    pub struct TauriLeadStore {
        app_handle: AppHandle,
    }

    impl TauriLeadStore {
        pub fn new(app_handle: &AppHandle) -> Self {
            Self {
                app_handle: app_handle.clone(),
            }
        }
    }

    impl LeadStore for TauriLeadStore {
        fn load(&self) -> Vec<Lead> {
            match self.app_handle.store(LEADS_STORE_PATH) {
                Ok(store) => store
                    .get(LEADS_STORE_KEY)
                    .map(leads_from_value)
                    .unwrap_or_default(),
                Err(e) => {
                    log::error!("Failed to open lead store: {}", e);
                    Vec::new()
                }
            }
        }

        fn save(&self, leads: &[Lead]) -> Result<()> {
            let store = self
                .app_handle
                .store(LEADS_STORE_PATH)
                .map_err(|e| anyhow!("Failed to open lead store: {}", e))?;
            store.set(LEADS_STORE_KEY, serde_json::to_value(capped(leads))?);
            store
                .save()
                .map_err(|e| anyhow!("Failed to persist lead store: {}", e))
        }
    }
}
