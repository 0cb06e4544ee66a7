use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendEvent, DownloadStateChanged, LoadStateChanged};
use crate::config::ConfigStore;

use super::catalog::CatalogHandle;
use super::controller::SelectionController;
use super::store::{DownloadProgress, DownloadStats, LifecycleStore, LoaderStatus};

/// Settle delay before acting on a download-complete signal, absorbing any
/// trailing extraction event.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Hints to the hosting UI, fire and forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiNotice {
    /// An auto-select is about to take effect; close any open model picker.
    ClosePicker,
}

/// Running listener task. Cancelling releases the subscription so no state
/// is written after the consumer is gone.
pub struct ListenerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}

/// Folds asynchronous backend notifications into the lifecycle store.
///
/// Events are unordered relative to user-issued commands, so every fold is
/// idempotent: re-applying an event, or receiving a stale one, settles on
/// last-event-wins without corrupting state. The backend remains the single
/// source of truth.
pub struct EventListener<C: ConfigStore> {
    controller: Arc<SelectionController<C>>,
    backend: Arc<dyn Backend>,
    store: Arc<LifecycleStore>,
    catalog: Arc<CatalogHandle>,
    settle_delay: Duration,
    notices: broadcast::Sender<UiNotice>,
    cancel: CancellationToken,
}

impl<C: ConfigStore + Send + Sync + 'static> EventListener<C> {
    pub fn new(controller: Arc<SelectionController<C>>) -> Self {
        let (notices, _) = broadcast::channel(16);
        Self {
            backend: controller.backend().clone(),
            store: controller.store().clone(),
            catalog: controller.catalog().clone(),
            controller,
            settle_delay: SETTLE_DELAY,
            notices,
            cancel: CancellationToken::new(),
        }
    }

    /// Override the settle delay. Tests use a short one.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<UiNotice> {
        self.notices.subscribe()
    }

    /// Consume the inbound event channel on a background task.
    pub fn spawn(self, mut events: mpsc::Receiver<BackendEvent>) -> ListenerHandle {
        let token = self.cancel.clone();
        let loop_token = token.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    },
                }
            }
            debug!("Event listener stopped");
        });
        ListenerHandle { token, task }
    }

    /// Fold one event. Public so hosts driving their own loop can call it.
    pub async fn handle_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::ModelState(state) => self.apply_load_state(state),
            BackendEvent::Download(state) => self.apply_download_state(state).await,
        }
    }

    fn apply_load_state(&self, state: LoadStateChanged) {
        match state {
            LoadStateChanged::Started { model_id } => {
                debug!("Model '{}' loading started", model_id);
                self.store.set_loader(LoaderStatus::Loading, None);
            }
            LoadStateChanged::Completed { model_id } => {
                info!("Model '{}' loaded", model_id);
                self.store.set_current_model(&model_id);
                self.store.set_loader(LoaderStatus::Ready, None);
                self.store.set_pending_model(None);
            }
            LoadStateChanged::Failed { model_id, error } => {
                warn!(
                    "Model '{}' failed to load: {}",
                    model_id,
                    error.as_deref().unwrap_or("unknown error")
                );
                self.store.set_loader(
                    LoaderStatus::Error,
                    Some(error.unwrap_or_else(|| "Failed to load model".to_string())),
                );
                self.store.set_pending_model(None);
            }
            LoadStateChanged::Unloaded => {
                debug!("Model unloaded");
                self.store.set_loader(LoaderStatus::Unloaded, None);
            }
        }
    }

    async fn apply_download_state(&self, state: DownloadStateChanged) {
        match state {
            DownloadStateChanged::Progress {
                model_id,
                downloaded_bytes,
                total_bytes,
                percentage,
                speed,
            } => {
                self.store.apply_download_progress(
                    &model_id,
                    DownloadProgress {
                        percentage,
                        downloaded_bytes,
                        total_bytes,
                    },
                    DownloadStats { speed },
                );
            }
            DownloadStateChanged::Extracting { model_id } => {
                info!("Model '{}' extracting", model_id);
                self.store.begin_extraction(&model_id);
            }
            DownloadStateChanged::Failed { model_id, error } => {
                warn!("Download of '{}' failed: {}", model_id, error);
                self.store.finish_download(&model_id);
            }
            DownloadStateChanged::Complete { model_id } => {
                info!("Download of '{}' complete", model_id);
                self.store.finish_download(&model_id);
                // The artifact now exists on disk; pick up is_downloaded.
                if let Err(e) = self.catalog.refresh(&*self.backend).await {
                    warn!("Catalog refresh after download failed: {}", e);
                }
                self.schedule_auto_select(model_id);
            }
        }
    }

    /// Auto-select a just-downloaded model after the settle delay, unless a
    /// capture session is running. The check re-reads live state after the
    /// delay, so a delete or trailing extraction naturally supersedes it.
    fn schedule_auto_select(&self, model_id: String) {
        let token = self.cancel.clone();
        let controller = self.controller.clone();
        let backend = self.backend.clone();
        let store = self.store.clone();
        let catalog = self.catalog.clone();
        let notices = self.notices.clone();
        let delay = self.settle_delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            if !catalog.current().contains(&model_id) {
                debug!("Auto-select skipped: '{}' no longer in catalog", model_id);
                return;
            }
            let snapshot = store.snapshot();
            if snapshot.is_downloading(&model_id) || snapshot.is_extracting(&model_id) {
                debug!("Auto-select skipped: '{}' still in flight", model_id);
                return;
            }
            match backend.is_capture_in_progress().await {
                Ok(false) => {}
                Ok(true) => {
                    debug!("Auto-select skipped: capture in progress");
                    return;
                }
                Err(e) => {
                    debug!("Auto-select skipped: {}", e);
                    return;
                }
            }

            store.set_pending_model(Some(&model_id));
            store.clear_loader_error();
            let _ = notices.send(UiNotice::ClosePicker);

            // Background action: a failure reverts silently inside the
            // quiet select, no error surfaces.
            if controller.select_local_quiet(&model_id).await.is_err() {
                debug!("Auto-select of '{}' dropped", model_id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use crate::providers::catalog::cloud_provider_registry;
    use crate::providers::controller::tests::{local_provider, Confirm, MockBackend};
    use crate::providers::{ProviderCatalog, ProviderStatus, LOCAL_PROVIDER_ID};
    use crate::providers::{resolve_status, LifecycleSnapshot};

    const TEST_SETTLE: Duration = Duration::from_millis(10);

    struct Fixture {
        backend: Arc<MockBackend>,
        store: Arc<LifecycleStore>,
        catalog: Arc<CatalogHandle>,
        controller: Arc<SelectionController<MemoryConfigStore>>,
    }

    impl Fixture {
        fn new(backend: MockBackend) -> Self {
            let mut providers = vec![
                local_provider("whisper-base", false),
                local_provider("whisper-small", false),
            ];
            providers.extend(cloud_provider_registry());
            *backend.providers.lock().unwrap() = providers.clone();

            let backend = Arc::new(backend);
            let store = Arc::new(LifecycleStore::new());
            let catalog = CatalogHandle::new();
            catalog.replace(ProviderCatalog::new(providers));

            let controller = Arc::new(SelectionController::new(
                backend.clone(),
                Arc::new(MemoryConfigStore::new()),
                store.clone(),
                catalog.clone(),
                Arc::new(Confirm(true)),
            ));
            Self {
                backend,
                store,
                catalog,
                controller,
            }
        }

        fn listener(&self) -> EventListener<MemoryConfigStore> {
            EventListener::new(self.controller.clone()).with_settle_delay(TEST_SETTLE)
        }
    }

    fn progress_event(model_id: &str, percentage: f64) -> BackendEvent {
        BackendEvent::Download(DownloadStateChanged::Progress {
            model_id: model_id.to_string(),
            downloaded_bytes: (percentage * 1000.0) as u64,
            total_bytes: 100_000,
            percentage,
            speed: 4096.0,
        })
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn loading_completed_is_idempotent() {
        let fx = Fixture::new(MockBackend::default());
        let listener = fx.listener();
        fx.store.set_pending_model(Some("whisper-base"));

        let event = BackendEvent::ModelState(LoadStateChanged::Completed {
            model_id: "whisper-base".to_string(),
        });
        listener.handle_event(event.clone()).await;
        let once = fx.store.snapshot();
        listener.handle_event(event).await;
        let twice = fx.store.snapshot();

        assert_eq!(once, twice);
        assert_eq!(once.current_model, "whisper-base");
        assert_eq!(once.loader.status, LoaderStatus::Ready);
        assert_eq!(once.pending.pending_model_id, None);
    }

    #[tokio::test]
    async fn load_failure_sets_error_and_clears_pending() {
        let fx = Fixture::new(MockBackend::default());
        let listener = fx.listener();
        fx.store.set_pending_model(Some("whisper-base"));

        listener
            .handle_event(BackendEvent::ModelState(LoadStateChanged::Failed {
                model_id: "whisper-base".to_string(),
                error: Some("out of memory".to_string()),
            }))
            .await;

        let snap = fx.store.snapshot();
        assert_eq!(snap.loader.status, LoaderStatus::Error);
        assert_eq!(snap.loader.error.as_deref(), Some("out of memory"));
        assert_eq!(snap.pending.pending_model_id, None);
    }

    #[tokio::test]
    async fn load_failure_without_message_uses_generic_fallback() {
        let fx = Fixture::new(MockBackend::default());
        let listener = fx.listener();

        listener
            .handle_event(BackendEvent::ModelState(LoadStateChanged::Failed {
                model_id: "whisper-base".to_string(),
                error: None,
            }))
            .await;

        assert_eq!(
            fx.store.snapshot().loader.error.as_deref(),
            Some("Failed to load model")
        );
    }

    #[tokio::test]
    async fn stale_failed_after_started_is_last_event_wins() {
        let fx = Fixture::new(MockBackend::default());
        let listener = fx.listener();

        listener
            .handle_event(BackendEvent::ModelState(LoadStateChanged::Failed {
                model_id: "whisper-base".to_string(),
                error: None,
            }))
            .await;
        listener
            .handle_event(BackendEvent::ModelState(LoadStateChanged::Started {
                model_id: "whisper-base".to_string(),
            }))
            .await;

        let snap = fx.store.snapshot();
        assert_eq!(snap.loader.status, LoaderStatus::Loading);
        assert_eq!(snap.loader.error, None);
    }

    #[tokio::test]
    async fn download_lifecycle_resolves_through_all_statuses() {
        // Scenario: not downloaded -> downloading -> extracting -> complete,
        // then auto-select fires once nothing is capturing.
        let fx = Fixture::new(MockBackend::default());
        let listener = fx.listener();

        let provider = fx.catalog.current().get("whisper-base").cloned().unwrap();
        let status = |snap: &LifecycleSnapshot| resolve_status(&provider, &snap.status_context());

        assert_eq!(
            status(&fx.store.snapshot()),
            ProviderStatus::Downloadable
        );

        listener.handle_event(progress_event("whisper-base", 0.0)).await;
        assert_eq!(status(&fx.store.snapshot()), ProviderStatus::Downloading);

        listener.handle_event(progress_event("whisper-base", 100.0)).await;
        listener
            .handle_event(BackendEvent::Download(DownloadStateChanged::Extracting {
                model_id: "whisper-base".to_string(),
            }))
            .await;
        assert_eq!(status(&fx.store.snapshot()), ProviderStatus::Extracting);

        listener
            .handle_event(BackendEvent::Download(DownloadStateChanged::Complete {
                model_id: "whisper-base".to_string(),
            }))
            .await;

        wait_until(|| {
            fx.backend
                .calls()
                .contains(&"switch_active_model:whisper-base".to_string())
        })
        .await;
        assert_eq!(
            fx.store.snapshot().pending.pending_model_id.as_deref(),
            Some("whisper-base")
        );
        assert_eq!(
            fx.store.snapshot().active_stt_provider_id,
            LOCAL_PROVIDER_ID
        );
    }

    #[tokio::test]
    async fn auto_select_never_fires_during_capture() {
        let backend = MockBackend::default();
        *backend.capture_in_progress.lock().unwrap() = true;
        let fx = Fixture::new(backend);
        let listener = fx.listener();

        listener
            .handle_event(BackendEvent::Download(DownloadStateChanged::Complete {
                model_id: "whisper-base".to_string(),
            }))
            .await;

        tokio::time::sleep(TEST_SETTLE * 5).await;
        assert!(!fx
            .backend
            .calls()
            .iter()
            .any(|c| c.starts_with("switch_active_model")));
        assert_eq!(fx.store.snapshot().pending.pending_model_id, None);
    }

    #[tokio::test]
    async fn auto_select_failure_reverts_silently() {
        let backend = MockBackend::failing_on("switch_active_model");
        let fx = Fixture::new(backend);
        let listener = fx.listener();

        listener
            .handle_event(BackendEvent::Download(DownloadStateChanged::Complete {
                model_id: "whisper-base".to_string(),
            }))
            .await;

        wait_until(|| {
            fx.backend
                .calls()
                .contains(&"switch_active_model:whisper-base".to_string())
        })
        .await;
        wait_until(|| fx.store.snapshot().pending.pending_model_id.is_none()).await;

        // No user-visible error for a background action.
        let snap = fx.store.snapshot();
        assert_ne!(snap.loader.status, LoaderStatus::Error);
        assert_eq!(snap.loader.error, None);
    }

    #[tokio::test]
    async fn auto_select_emits_close_picker_notice() {
        let fx = Fixture::new(MockBackend::default());
        let listener = fx.listener();
        let mut notices = listener.subscribe_notices();

        listener
            .handle_event(BackendEvent::Download(DownloadStateChanged::Complete {
                model_id: "whisper-base".to_string(),
            }))
            .await;

        let notice = tokio::time::timeout(Duration::from_secs(1), notices.recv())
            .await
            .expect("notice in time")
            .unwrap();
        assert_eq!(notice, UiNotice::ClosePicker);
    }

    #[tokio::test]
    async fn cancelling_one_download_leaves_the_other_untouched() {
        // Scenario D: the backend confirms one cancellation by folding that
        // id out; the concurrent download keeps its progress entry.
        let fx = Fixture::new(MockBackend::default());
        let listener = fx.listener();

        listener.handle_event(progress_event("whisper-base", 20.0)).await;
        listener.handle_event(progress_event("whisper-small", 70.0)).await;
        listener
            .handle_event(BackendEvent::Download(DownloadStateChanged::Failed {
                model_id: "whisper-base".to_string(),
                error: "Download cancelled".to_string(),
            }))
            .await;

        let snap = fx.store.snapshot();
        assert!(!snap.is_downloading("whisper-base"));
        assert!(snap.is_downloading("whisper-small"));
        assert_eq!(snap.download_progress["whisper-small"].percentage, 70.0);
    }

    #[tokio::test]
    async fn shutdown_releases_the_subscription() {
        let fx = Fixture::new(MockBackend::default());
        let (tx, rx) = mpsc::channel(8);
        let handle = fx.listener().spawn(rx);

        tx.send(progress_event("whisper-base", 10.0)).await.unwrap();
        wait_until(|| fx.store.snapshot().is_downloading("whisper-base")).await;

        handle.shutdown().await;

        // The receiver is gone; nothing folds state anymore.
        assert!(tx.send(progress_event("whisper-base", 50.0)).await.is_err());
        assert_eq!(
            fx.store.snapshot().download_progress["whisper-base"].percentage,
            10.0
        );
    }
}
