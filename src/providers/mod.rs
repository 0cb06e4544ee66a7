pub mod catalog;
pub mod controller;
pub mod listener;
pub mod status;
pub mod store;
pub mod views;

pub use catalog::{cloud_provider_registry, CatalogHandle, ProviderCatalog};
pub use controller::{CloudSelectOutcome, DeleteOutcome, SelectionController};
pub use listener::{EventListener, ListenerHandle, UiNotice};
pub use status::{resolve_status, ProviderStatus, StatusContext};
pub use store::{
    DownloadProgress, DownloadStats, LifecycleSnapshot, LifecycleStore, LoaderState, LoaderStatus,
    PendingSelection,
};
pub use views::{display_status, library_partition, my_providers, DisplayStatus};

use serde::{Deserialize, Serialize};

/// Sentinel provider id meaning "local transcription" rather than a cloud API.
pub const LOCAL_PROVIDER_ID: &str = "local";

/// Engine that runs a local model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Whisper,
    Parakeet,
}

/// Typed config field a cloud provider exposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CloudOptionKind {
    /// Single language selector.
    Language,
    /// Multi-language selector.
    LanguageMulti,
    /// Free-form text field.
    Text,
    /// Numeric field with bounds.
    Number { min: f64, max: f64, step: f64 },
    Boolean,
}

/// One configurable option in a cloud provider's config schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderOption {
    /// Key under which the value is stored in the provider's cloud options.
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub option_type: CloudOptionKind,
}

/// Backend-specific half of a provider. Exactly one kind per provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderBackend {
    #[serde(rename_all = "camelCase")]
    Local {
        engine_type: EngineType,
        size_mb: u64,
        is_downloaded: bool,
        is_custom: bool,
        accuracy_score: f32,
        speed_score: f32,
    },
    #[serde(rename_all = "camelCase")]
    Cloud {
        base_url: String,
        default_model: String,
        console_url: Option<String>,
        available_options: Vec<CloudProviderOption>,
    },
}

/// A selectable transcription provider: a local on-device model or a cloud API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Unique, stable for the lifetime of a catalog snapshot.
    pub id: String,
    pub name: String,
    pub description: String,
    pub supported_languages: Vec<String>,
    pub supports_translation: bool,
    pub is_recommended: bool,
    pub backend: ProviderBackend,
}

impl Provider {
    pub fn is_cloud(&self) -> bool {
        matches!(self.backend, ProviderBackend::Cloud { .. })
    }

    pub fn is_local(&self) -> bool {
        matches!(self.backend, ProviderBackend::Local { .. })
    }

    /// Whether the local artifact exists on disk. Always false for cloud providers.
    pub fn is_downloaded(&self) -> bool {
        matches!(
            self.backend,
            ProviderBackend::Local {
                is_downloaded: true,
                ..
            }
        )
    }

    /// Whether this is a user-imported local model. Always false for cloud providers.
    pub fn is_custom(&self) -> bool {
        matches!(
            self.backend,
            ProviderBackend::Local { is_custom: true, .. }
        )
    }
}
