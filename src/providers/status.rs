use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Provider, LOCAL_PROVIDER_ID};

/// Display status of a provider card.
///
/// `Error` and `None` are produced by the layered loader state
/// (see `views::display_status`), never by `resolve_status` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Downloadable,
    Downloading,
    Extracting,
    Switching,
    Active,
    Available,
    Error,
    None,
}

/// Inputs to status resolution: the lifecycle snapshot fields plus the
/// UI-local switching marker.
#[derive(Debug, Clone, Copy)]
pub struct StatusContext<'a> {
    pub extracting_models: &'a HashSet<String>,
    pub downloading_models: &'a HashSet<String>,
    /// Set only while a select-operation is in flight.
    pub switching_model_id: Option<&'a str>,
    /// Active local model id.
    pub current_model: &'a str,
    /// "local" or a cloud provider id.
    pub active_stt_provider_id: &'a str,
}

/// Map a provider and the current lifecycle state to a display status.
///
/// Pure and total. First match wins; the ordering is deliberate:
/// extraction/downloading must dominate a stale "active" from a previous
/// selection, and "switching" must not be masked by "available" while a
/// local switch is in flight.
pub fn resolve_status(provider: &Provider, ctx: &StatusContext<'_>) -> ProviderStatus {
    if provider.is_cloud() {
        // Cloud providers have no local artifact, so they are never
        // downloadable/downloading/extracting.
        return if ctx.active_stt_provider_id == provider.id {
            ProviderStatus::Active
        } else {
            ProviderStatus::Available
        };
    }
    if ctx.extracting_models.contains(&provider.id) {
        return ProviderStatus::Extracting;
    }
    if ctx.downloading_models.contains(&provider.id) {
        return ProviderStatus::Downloading;
    }
    if ctx.switching_model_id == Some(provider.id.as_str()) {
        return ProviderStatus::Switching;
    }
    if provider.id == ctx.current_model && ctx.active_stt_provider_id == LOCAL_PROVIDER_ID {
        return ProviderStatus::Active;
    }
    if provider.is_downloaded() {
        return ProviderStatus::Available;
    }
    ProviderStatus::Downloadable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{EngineType, ProviderBackend};

    fn local(id: &str, is_downloaded: bool) -> Provider {
        Provider {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            supported_languages: vec!["en".to_string()],
            supports_translation: false,
            is_recommended: false,
            backend: ProviderBackend::Local {
                engine_type: EngineType::Whisper,
                size_mb: 465,
                is_downloaded,
                is_custom: false,
                accuracy_score: 0.7,
                speed_score: 0.8,
            },
        }
    }

    fn cloud(id: &str) -> Provider {
        Provider {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            supported_languages: vec!["en".to_string()],
            supports_translation: false,
            is_recommended: false,
            backend: ProviderBackend::Cloud {
                base_url: "https://api.example.com/v1".to_string(),
                default_model: "base".to_string(),
                console_url: None,
                available_options: vec![],
            },
        }
    }

    struct Ctx {
        extracting: HashSet<String>,
        downloading: HashSet<String>,
        switching: Option<String>,
        current_model: String,
        stt_provider: String,
    }

    impl Ctx {
        fn new() -> Self {
            Self {
                extracting: HashSet::new(),
                downloading: HashSet::new(),
                switching: None,
                current_model: String::new(),
                stt_provider: LOCAL_PROVIDER_ID.to_string(),
            }
        }

        fn as_status_context(&self) -> StatusContext<'_> {
            StatusContext {
                extracting_models: &self.extracting,
                downloading_models: &self.downloading,
                switching_model_id: self.switching.as_deref(),
                current_model: &self.current_model,
                active_stt_provider_id: &self.stt_provider,
            }
        }
    }

    #[test]
    fn not_downloaded_model_is_downloadable() {
        let ctx = Ctx::new();
        assert_eq!(
            resolve_status(&local("whisper-base", false), &ctx.as_status_context()),
            ProviderStatus::Downloadable
        );
    }

    #[test]
    fn downloaded_model_is_available() {
        let ctx = Ctx::new();
        assert_eq!(
            resolve_status(&local("whisper-base", true), &ctx.as_status_context()),
            ProviderStatus::Available
        );
    }

    #[test]
    fn current_model_is_active_only_in_local_mode() {
        let mut ctx = Ctx::new();
        ctx.current_model = "whisper-base".to_string();
        assert_eq!(
            resolve_status(&local("whisper-base", true), &ctx.as_status_context()),
            ProviderStatus::Active
        );

        ctx.stt_provider = "openai_stt".to_string();
        assert_eq!(
            resolve_status(&local("whisper-base", true), &ctx.as_status_context()),
            ProviderStatus::Available
        );
    }

    #[test]
    fn extracting_dominates_every_other_condition() {
        // All competing conditions hold at once: downloading, switching,
        // active, downloaded. Extraction must still win.
        let mut ctx = Ctx::new();
        ctx.extracting.insert("whisper-base".to_string());
        ctx.downloading.insert("whisper-base".to_string());
        ctx.switching = Some("whisper-base".to_string());
        ctx.current_model = "whisper-base".to_string();
        assert_eq!(
            resolve_status(&local("whisper-base", true), &ctx.as_status_context()),
            ProviderStatus::Extracting
        );
    }

    #[test]
    fn downloading_dominates_switching_and_active() {
        let mut ctx = Ctx::new();
        ctx.downloading.insert("whisper-base".to_string());
        ctx.switching = Some("whisper-base".to_string());
        ctx.current_model = "whisper-base".to_string();
        assert_eq!(
            resolve_status(&local("whisper-base", true), &ctx.as_status_context()),
            ProviderStatus::Downloading
        );
    }

    #[test]
    fn switching_is_not_masked_by_available() {
        let mut ctx = Ctx::new();
        ctx.switching = Some("whisper-base".to_string());
        assert_eq!(
            resolve_status(&local("whisper-base", true), &ctx.as_status_context()),
            ProviderStatus::Switching
        );
    }

    #[test]
    fn cloud_provider_is_active_or_available() {
        let mut ctx = Ctx::new();
        assert_eq!(
            resolve_status(&cloud("openai_stt"), &ctx.as_status_context()),
            ProviderStatus::Available
        );

        ctx.stt_provider = "openai_stt".to_string();
        assert_eq!(
            resolve_status(&cloud("openai_stt"), &ctx.as_status_context()),
            ProviderStatus::Active
        );
    }

    #[test]
    fn cloud_provider_ignores_download_state() {
        // Even with its id present in the in-flight sets, a cloud provider
        // never resolves to downloadable/downloading/extracting.
        let mut ctx = Ctx::new();
        ctx.extracting.insert("openai_stt".to_string());
        ctx.downloading.insert("openai_stt".to_string());
        ctx.switching = Some("openai_stt".to_string());
        assert_eq!(
            resolve_status(&cloud("openai_stt"), &ctx.as_status_context()),
            ProviderStatus::Available
        );
    }

    #[test]
    fn other_models_are_unaffected_by_in_flight_ids() {
        let mut ctx = Ctx::new();
        ctx.downloading.insert("whisper-small".to_string());
        ctx.extracting.insert("whisper-medium".to_string());
        assert_eq!(
            resolve_status(&local("whisper-base", false), &ctx.as_status_context()),
            ProviderStatus::Downloadable
        );
    }
}
