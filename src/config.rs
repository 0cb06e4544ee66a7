use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::providers::LOCAL_PROVIDER_ID;

/// Type-safe configuration key that associates a key name with its value type
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey<T> {
    name: &'static str,
    _phantom: PhantomData<T>,
}

impl<T> ConfigKey<T> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    pub fn key_name(&self) -> &'static str {
        self.name
    }
}

/// Settings collaborator boundary. The host application persists these
/// however it likes (a store file, OS keychain, ...); this core only reads
/// and writes through typed keys.
pub trait ConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T>;
    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), String>;
    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), String>;
}

// ===== STT Provider Configuration =====

/// Per-provider cloud configuration plus the provider-mode selector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SttSettings {
    /// "local" or a cloud provider id.
    #[serde(default = "default_provider_id", alias = "stt_provider_id")]
    pub stt_provider_id: String,
    /// API key per cloud provider id.
    #[serde(default, alias = "stt_api_keys")]
    pub api_keys: HashMap<String, String>,
    /// Configured model per cloud provider id (falls back to the provider's
    /// default model when absent).
    #[serde(default, alias = "stt_cloud_models")]
    pub cloud_models: HashMap<String, String>,
    /// Free-form option values per cloud provider id, keyed by option id.
    #[serde(default, alias = "stt_cloud_options")]
    pub cloud_options: HashMap<String, serde_json::Value>,
    /// Providers whose credentials passed verification.
    #[serde(default, alias = "stt_verified_providers")]
    pub verified_providers: HashSet<String>,
    /// Realtime transcription toggle per cloud provider id.
    #[serde(default, alias = "stt_realtime_enabled")]
    pub realtime_enabled: HashMap<String, bool>,
}

fn default_provider_id() -> String {
    LOCAL_PROVIDER_ID.to_string()
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            stt_provider_id: LOCAL_PROVIDER_ID.to_string(),
            api_keys: HashMap::new(),
            cloud_models: HashMap::new(),
            cloud_options: HashMap::new(),
            verified_providers: HashSet::new(),
            realtime_enabled: HashMap::new(),
        }
    }
}

impl SttSettings {
    /// Load from the store, defaulting when nothing is persisted yet.
    pub fn load(store: &impl ConfigStore) -> Self {
        store.get(&ConfigKey::STT).unwrap_or_default()
    }

    pub fn save(&self, store: &impl ConfigStore) -> Result<(), String> {
        store.set(&ConfigKey::STT, self.clone())
    }

    /// Whether a cloud provider has a non-empty API key configured.
    pub fn is_cloud_configured(&self, provider_id: &str) -> bool {
        self.api_keys
            .get(provider_id)
            .is_some_and(|key| !key.is_empty())
    }

    pub fn is_verified(&self, provider_id: &str) -> bool {
        self.verified_providers.contains(provider_id)
    }
}

impl ConfigKey<SttSettings> {
    pub const STT: Self = Self::new("sttSettings");
}

// ===== In-memory store =====

/// In-memory `ConfigStore` for tests and embedders without persistence.
#[derive(Default)]
pub struct MemoryConfigStore {
    data: std::sync::Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
        self.data
            .lock()
            .unwrap()
            .get(key.key_name())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), String> {
        let val = serde_json::to_value(value).map_err(|e| e.to_string())?;
        self.data
            .lock()
            .unwrap()
            .insert(key.key_name().to_string(), val);
        Ok(())
    }

    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), String> {
        self.data.lock().unwrap().remove(key.key_name());
        Ok(())
    }
}
