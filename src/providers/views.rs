use crate::config::SttSettings;

use super::store::{LifecycleSnapshot, LoaderStatus};
use super::{Provider, ProviderCatalog};

/// What the model selector button shows, folded from the whole snapshot
/// rather than any single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DisplayStatus {
    Ready,
    Loading,
    Downloading,
    Extracting,
    Error,
    Unloaded,
}

/// Providers the user has set up: configured cloud providers plus local
/// models that are downloaded, custom, or currently in flight. Cloud first,
/// custom local models last.
pub fn my_providers(
    catalog: &ProviderCatalog,
    snapshot: &LifecycleSnapshot,
    settings: &SttSettings,
) -> Vec<Provider> {
    let mut out: Vec<Provider> = catalog
        .iter()
        .filter(|p| {
            if p.is_cloud() {
                settings.is_cloud_configured(&p.id)
            } else {
                p.is_downloaded()
                    || p.is_custom()
                    || snapshot.is_downloading(&p.id)
                    || snapshot.is_extracting(&p.id)
            }
        })
        .cloned()
        .collect();
    out.sort_by_key(|p| (!p.is_cloud(), p.is_custom()));
    out
}

/// Local models split for the library tab: (installed-or-in-flight,
/// available for download), optionally narrowed to one language. Custom
/// models sort last within the installed half.
pub fn library_partition(
    catalog: &ProviderCatalog,
    snapshot: &LifecycleSnapshot,
    language_filter: Option<&str>,
) -> (Vec<Provider>, Vec<Provider>) {
    let (mut installed, available): (Vec<Provider>, Vec<Provider>) = catalog
        .local_providers()
        .filter(|p| match language_filter {
            Some(lang) => p.supported_languages.iter().any(|l| l == lang),
            None => true,
        })
        .cloned()
        .partition(|p| {
            p.is_downloaded()
                || p.is_custom()
                || snapshot.is_downloading(&p.id)
                || snapshot.is_extracting(&p.id)
        });
    installed.sort_by_key(Provider::is_custom);
    (installed, available)
}

/// Selector-button status. Download activity anywhere wins over the loader
/// state, and a cloud provider being active short-circuits to Ready since
/// no local model needs to load for it.
pub fn display_status(snapshot: &LifecycleSnapshot) -> DisplayStatus {
    if !snapshot.extracting_models.is_empty() {
        return DisplayStatus::Extracting;
    }
    if !snapshot.downloading_models.is_empty() {
        return DisplayStatus::Downloading;
    }
    if snapshot.active_stt_provider_id != super::LOCAL_PROVIDER_ID {
        return DisplayStatus::Ready;
    }
    match snapshot.loader.status {
        LoaderStatus::Ready => DisplayStatus::Ready,
        LoaderStatus::Loading => DisplayStatus::Loading,
        LoaderStatus::Error => DisplayStatus::Error,
        LoaderStatus::Unloaded | LoaderStatus::None => DisplayStatus::Unloaded,
    }
}
