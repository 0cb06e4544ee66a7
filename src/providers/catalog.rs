use std::sync::{Arc, Mutex};

use log::debug;

use crate::backend::{Backend, BackendError};

use super::{CloudOptionKind, CloudProviderOption, Provider, ProviderBackend};

/// Immutable-per-snapshot list of providers (local + cloud).
///
/// Built from `Backend::list_providers` and refreshed after any
/// download/delete/verify completes. Lookup is by id; ids are unique
/// across both backend kinds for the lifetime of a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderCatalog {
    providers: Vec<Provider>,
}

impl ProviderCatalog {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn cloud_providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|p| p.is_cloud())
    }

    pub fn local_providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|p| p.is_local())
    }
}

/// Shared handle to the latest catalog snapshot.
///
/// Refreshing swaps the whole snapshot; readers clone it and never observe
/// a half-updated list.
pub struct CatalogHandle {
    inner: Mutex<ProviderCatalog>,
}

impl CatalogHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ProviderCatalog::default()),
        })
    }

    /// Current snapshot (cloned).
    pub fn current(&self) -> ProviderCatalog {
        self.inner.lock().unwrap().clone()
    }

    /// Replace the snapshot wholesale. Used by tests and embedders that
    /// already hold a provider list.
    pub fn replace(&self, catalog: ProviderCatalog) {
        *self.inner.lock().unwrap() = catalog;
    }

    /// Fetch a fresh provider list from the backend and swap it in.
    pub async fn refresh(&self, backend: &dyn Backend) -> Result<(), BackendError> {
        let providers = backend.list_providers().await?;
        debug!("Catalog refreshed: {} providers", providers.len());
        *self.inner.lock().unwrap() = ProviderCatalog::new(providers);
        Ok(())
    }
}

impl std::fmt::Debug for CatalogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogHandle")
            .field("providers", &self.inner.lock().unwrap().len())
            .finish()
    }
}

/// Built-in cloud provider definitions.
///
/// Backend implementations append these to the local model list when
/// serving `list_providers`.
pub fn cloud_provider_registry() -> Vec<Provider> {
    vec![
        Provider {
            id: "openai_stt".to_string(),
            name: "OpenAI".to_string(),
            description: "OpenAI's cloud speech-to-text API. Fast and accurate with support for 57+ languages.".to_string(),
            supported_languages: vec![
                "af", "ar", "hy", "az", "be", "bs", "bg", "ca", "zh", "hr",
                "cs", "da", "nl", "en", "et", "fi", "fr", "gl", "de", "el",
                "he", "hi", "hu", "is", "id", "it", "ja", "kn", "kk", "ko",
                "lv", "lt", "mk", "ms", "mr", "mi", "ne", "no", "fa", "pl",
                "pt", "ro", "ru", "sr", "sk", "sl", "es", "sw", "sv", "tl",
                "ta", "th", "tr", "uk", "ur", "vi", "cy",
            ].into_iter().map(String::from).collect(),
            supports_translation: true,
            is_recommended: false,
            backend: ProviderBackend::Cloud {
                base_url: "https://api.openai.com/v1".to_string(),
                default_model: "whisper-1".to_string(),
                console_url: Some("https://platform.openai.com/api-keys".to_string()),
                available_options: vec![
                    CloudProviderOption {
                        id: "language".to_string(),
                        label: "Transcription language".to_string(),
                        description: None,
                        option_type: CloudOptionKind::Language,
                    },
                    CloudProviderOption {
                        id: "prompt".to_string(),
                        label: "Prompt".to_string(),
                        description: Some(
                            "Optional text to guide the model's style or vocabulary.".to_string(),
                        ),
                        option_type: CloudOptionKind::Text,
                    },
                    CloudProviderOption {
                        id: "temperature".to_string(),
                        label: "Temperature".to_string(),
                        description: None,
                        option_type: CloudOptionKind::Number {
                            min: 0.0,
                            max: 1.0,
                            step: 0.1,
                        },
                    },
                ],
            },
        },
        Provider {
            id: "soniox".to_string(),
            name: "Soniox".to_string(),
            description: "Soniox cloud speech-to-text. High accuracy with async transcription.".to_string(),
            supported_languages: vec![
                "en", "es", "fr", "de", "it", "pt", "nl", "ja", "ko", "zh",
                "ru", "ar", "hi", "pl", "tr", "sv", "da", "no", "fi",
            ].into_iter().map(String::from).collect(),
            supports_translation: false,
            is_recommended: false,
            backend: ProviderBackend::Cloud {
                base_url: "https://api.soniox.com/v1".to_string(),
                default_model: "stt-async-v4".to_string(),
                console_url: Some("https://console.soniox.com".to_string()),
                available_options: vec![
                    CloudProviderOption {
                        id: "language_hints".to_string(),
                        label: "Language hints".to_string(),
                        description: Some(
                            "Languages likely to appear in the audio.".to_string(),
                        ),
                        option_type: CloudOptionKind::LanguageMulti,
                    },
                    CloudProviderOption {
                        id: "realtime".to_string(),
                        label: "Realtime transcription".to_string(),
                        description: None,
                        option_type: CloudOptionKind::Boolean,
                    },
                ],
            },
        },
    ]
}

pub fn is_cloud_provider_in_registry(id: &str) -> bool {
    cloud_provider_registry().iter().any(|p| p.id == id)
}
