use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::status::StatusContext;
use super::LOCAL_PROVIDER_ID;

/// Progress of one in-flight download.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// 0..100.
    pub percentage: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
}

/// Throughput of one in-flight download.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStats {
    /// Bytes per second.
    pub speed: f64,
}

/// Is the currently displayed model loaded into the inference engine?
///
/// Layered above `ProviderStatus`: the resolver answers "what is happening
/// to this provider in the catalog", this answers "is the engine ready".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum LoaderStatus {
    Ready,
    Loading,
    Error,
    #[default]
    Unloaded,
    /// No model selected at all.
    None,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoaderState {
    pub status: LoaderStatus,
    pub error: Option<String>,
}

/// Optimistic UI-held state, kept apart from the backend-confirmed fields
/// and never inferred from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingSelection {
    /// Set only while a select-operation is in flight.
    pub switching_model_id: Option<String>,
    /// "I just asked to switch to this id", cleared on confirmation or failure.
    pub pending_model_id: Option<String>,
}

/// Process-wide lifecycle state. Single authoritative instance, owned by
/// `LifecycleStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSnapshot {
    /// Active local model id ("" when none selected yet).
    pub current_model: String,
    /// "local" or a cloud provider id.
    pub active_stt_provider_id: String,
    /// Ids with a download in flight. Presence-only.
    pub downloading_models: HashSet<String>,
    pub download_progress: HashMap<String, DownloadProgress>,
    pub download_stats: HashMap<String, DownloadStats>,
    /// Ids unpacking a downloaded archive. Mutually exclusive per id with
    /// `downloading_models`; both sets may be non-empty across different ids.
    pub extracting_models: HashSet<String>,
    pub pending: PendingSelection,
    pub loader: LoaderState,
}

impl Default for LifecycleSnapshot {
    fn default() -> Self {
        Self {
            current_model: String::new(),
            active_stt_provider_id: LOCAL_PROVIDER_ID.to_string(),
            downloading_models: HashSet::new(),
            download_progress: HashMap::new(),
            download_stats: HashMap::new(),
            extracting_models: HashSet::new(),
            pending: PendingSelection::default(),
            loader: LoaderState::default(),
        }
    }
}

impl LifecycleSnapshot {
    /// Build the resolver inputs from this snapshot.
    pub fn status_context(&self) -> StatusContext<'_> {
        StatusContext {
            extracting_models: &self.extracting_models,
            downloading_models: &self.downloading_models,
            switching_model_id: self.pending.switching_model_id.as_deref(),
            current_model: &self.current_model,
            active_stt_provider_id: &self.active_stt_provider_id,
        }
    }

    /// Id to show in the selector: the optimistic pending id wins over the
    /// confirmed current model.
    pub fn display_model_id(&self) -> Option<&str> {
        self.pending
            .pending_model_id
            .as_deref()
            .or_else(|| (!self.current_model.is_empty()).then_some(self.current_model.as_str()))
    }

    pub fn is_downloading(&self, id: &str) -> bool {
        self.downloading_models.contains(id)
    }

    pub fn is_extracting(&self, id: &str) -> bool {
        self.extracting_models.contains(id)
    }
}

/// Owns the lifecycle snapshot and the only mutation paths into it.
///
/// Rendering consumers read via `snapshot`/`subscribe`; writes happen only
/// through the `SelectionController` (optimistic) and the `EventListener`
/// (authoritative corrections), which call the crate-private mutators below.
#[derive(Debug)]
pub struct LifecycleStore {
    tx: watch::Sender<LifecycleSnapshot>,
}

impl LifecycleStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleSnapshot::default());
        Self { tx }
    }

    /// Current state (cloned).
    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.tx.borrow().clone()
    }

    /// Read-only observation channel. Receivers see every committed update.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.tx.subscribe()
    }

    fn update(&self, f: impl FnOnce(&mut LifecycleSnapshot)) {
        self.tx.send_modify(f);
    }

    pub(crate) fn set_current_model(&self, id: &str) {
        debug!("current model -> '{}'", id);
        self.update(|s| s.current_model = id.to_string());
    }

    pub(crate) fn set_active_stt_provider(&self, id: &str) {
        debug!("active stt provider -> '{}'", id);
        self.update(|s| s.active_stt_provider_id = id.to_string());
    }

    /// Set the switching marker. A new selection overwrites any in-flight
    /// marker (last-writer-wins; the backend serializes actual loads).
    pub(crate) fn begin_switch(&self, id: &str) {
        self.update(|s| s.pending.switching_model_id = Some(id.to_string()));
    }

    pub(crate) fn end_switch(&self) {
        self.update(|s| s.pending.switching_model_id = None);
    }

    pub(crate) fn set_pending_model(&self, id: Option<&str>) {
        self.update(|s| s.pending.pending_model_id = id.map(str::to_string));
    }

    pub(crate) fn set_loader(&self, status: LoaderStatus, error: Option<String>) {
        self.update(|s| s.loader = LoaderState { status, error });
    }

    pub(crate) fn clear_loader_error(&self) {
        self.update(|s| s.loader.error = None);
    }

    /// Fold a progress update: the id is downloading, not extracting.
    pub(crate) fn apply_download_progress(
        &self,
        id: &str,
        progress: DownloadProgress,
        stats: DownloadStats,
    ) {
        self.update(|s| {
            s.extracting_models.remove(id);
            s.downloading_models.insert(id.to_string());
            s.download_progress.insert(id.to_string(), progress);
            s.download_stats.insert(id.to_string(), stats);
        });
    }

    /// Download finished, archive unpacking started: move the id from
    /// downloading to extracting and drop its progress entries.
    pub(crate) fn begin_extraction(&self, id: &str) {
        self.update(|s| {
            s.downloading_models.remove(id);
            s.download_progress.remove(id);
            s.download_stats.remove(id);
            s.extracting_models.insert(id.to_string());
        });
    }

    /// Terminal download event (complete or failed): the id leaves both
    /// in-flight sets.
    pub(crate) fn finish_download(&self, id: &str) {
        self.update(|s| {
            s.downloading_models.remove(id);
            s.extracting_models.remove(id);
            s.download_progress.remove(id);
            s.download_stats.remove(id);
        });
    }
}

impl Default for LifecycleStore {
    fn default() -> Self {
        Self::new()
    }
}
