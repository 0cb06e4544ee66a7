use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::backend::Backend;
use crate::config::{ConfigStore, SttSettings};

use super::catalog::CatalogHandle;
use super::store::{LifecycleStore, LoaderStatus};
use super::LOCAL_PROVIDER_ID;

/// User-visible failure of a controller operation. One short message per
/// action; backend details stay in the log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("Failed to switch model")]
    SwitchFailed,
    #[error("Failed to switch to cloud provider")]
    CloudSwitchFailed,
    #[error("Failed to start download for '{0}'")]
    DownloadFailed(String),
    #[error("Failed to cancel download for '{0}'")]
    CancelFailed(String),
    #[error("Failed to delete model '{0}'")]
    DeleteFailed(String),
    #[error("{0}")]
    VerificationFailed(String),
    #[error("Failed to save settings")]
    SettingsWrite,
    #[error("Provider '{0}' not found")]
    UnknownProvider(String),
    #[error("Provider '{0}' is not a cloud provider")]
    NotCloudProvider(String),
}

/// Outcome of asking to select a cloud provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudSelectOutcome {
    Activated,
    /// The provider has no verified credentials yet; route the user to its
    /// configuration instead of activating it.
    NeedsConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// User declined the confirmation; nothing changed.
    Declined,
}

/// Confirmation prompt for deleting a local model. The phrasing differs
/// when the target is the currently active model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePrompt {
    Model { name: String },
    ActiveModel { name: String },
}

impl DeletePrompt {
    /// Default English phrasing; hosts with i18n render their own.
    pub fn message(&self) -> String {
        match self {
            DeletePrompt::Model { name } => {
                format!("Delete {}? You can download it again later.", name)
            }
            DeletePrompt::ActiveModel { name } => format!(
                "{} is currently in use. Delete it anyway? Transcription will stop working until you select another model.",
                name
            ),
        }
    }
}

/// Interactive confirmation seam for destructive actions.
#[async_trait]
pub trait ConfirmDelete: Send + Sync {
    async fn confirm(&self, prompt: DeletePrompt) -> bool;
}

/// Orchestrates user-invoked provider transitions: select, download,
/// cancel, delete, verify. Sequences backend calls and keeps the lifecycle
/// store's optimistic state honest, rolling it back on failure.
pub struct SelectionController<C: ConfigStore> {
    backend: Arc<dyn Backend>,
    config: Arc<C>,
    store: Arc<LifecycleStore>,
    catalog: Arc<CatalogHandle>,
    confirm: Arc<dyn ConfirmDelete>,
}

impl<C: ConfigStore> SelectionController<C> {
    pub fn new(
        backend: Arc<dyn Backend>,
        config: Arc<C>,
        store: Arc<LifecycleStore>,
        catalog: Arc<CatalogHandle>,
        confirm: Arc<dyn ConfirmDelete>,
    ) -> Self {
        Self {
            backend,
            config,
            store,
            catalog,
            confirm,
        }
    }

    pub fn store(&self) -> &Arc<LifecycleStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<CatalogHandle> {
        &self.catalog
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Fetch the catalog and seed the store from persisted settings and the
    /// backend's view of what is loaded. Never fails hard: a status-check
    /// failure becomes a loader error, not a crash.
    pub async fn initialize(&self) {
        if let Err(e) = self.catalog.refresh(&*self.backend).await {
            error!("Failed to fetch provider catalog: {}", e);
        }

        let settings = SttSettings::load(&*self.config);
        self.store
            .set_active_stt_provider(&settings.stt_provider_id);

        match self.backend.get_active_model_status().await {
            Ok(Some(model_id)) => {
                self.store.set_current_model(&model_id);
                self.store.set_loader(LoaderStatus::Ready, None);
            }
            Ok(None) => {
                let status = if self.store.snapshot().current_model.is_empty() {
                    LoaderStatus::None
                } else {
                    LoaderStatus::Unloaded
                };
                self.store.set_loader(status, None);
            }
            Err(e) => {
                warn!("Failed to check model status: {}", e);
                self.store.set_loader(
                    LoaderStatus::Error,
                    Some("Failed to check model status".to_string()),
                );
            }
        }
    }

    /// Switch local transcription to `model_id`.
    ///
    /// Sets the switching marker and the optimistic pending id, flips the
    /// provider mode to "local", then asks the backend to load the model.
    /// The confirmed `current_model` update arrives later through the event
    /// listener. On failure every optimistic field is rolled back and the
    /// confirmed selection stays untouched.
    pub async fn select_local(&self, model_id: &str) -> Result<(), ControllerError> {
        self.select_local_inner(model_id, false).await
    }

    /// Same flow as `select_local`, but a failure only reverts the pending
    /// marker. Used for the background auto-select after a download, which
    /// must not surface a user-visible error.
    pub(crate) async fn select_local_quiet(&self, model_id: &str) -> Result<(), ControllerError> {
        self.select_local_inner(model_id, true).await
    }

    async fn select_local_inner(&self, model_id: &str, quiet: bool) -> Result<(), ControllerError> {
        self.store.begin_switch(model_id);
        self.store.set_pending_model(Some(model_id));
        self.store.clear_loader_error();

        let result = self.switch_to_local_model(model_id).await;
        self.store.end_switch();

        match result {
            Ok(()) => Ok(()),
            Err(message) => {
                warn!("Failed to switch to model '{}': {}", model_id, message);
                self.store.set_pending_model(None);
                if !quiet {
                    self.store.set_loader(
                        LoaderStatus::Error,
                        Some("Failed to switch model".to_string()),
                    );
                }
                Err(ControllerError::SwitchFailed)
            }
        }
    }

    async fn switch_to_local_model(&self, model_id: &str) -> Result<(), String> {
        self.backend
            .set_active_stt_provider(LOCAL_PROVIDER_ID)
            .await
            .map_err(|e| e.message)?;

        let mut settings = SttSettings::load(&*self.config);
        if settings.stt_provider_id != LOCAL_PROVIDER_ID {
            settings.stt_provider_id = LOCAL_PROVIDER_ID.to_string();
            settings.save(&*self.config)?;
        }
        self.store.set_active_stt_provider(LOCAL_PROVIDER_ID);

        self.backend
            .switch_active_model(model_id)
            .await
            .map_err(|e| e.message)
    }

    /// Activate a cloud provider, or report that it still needs
    /// configuration. Never touches local-model state.
    pub async fn select_cloud(
        &self,
        provider_id: &str,
    ) -> Result<CloudSelectOutcome, ControllerError> {
        let catalog = self.catalog.current();
        let provider = catalog
            .get(provider_id)
            .ok_or_else(|| ControllerError::UnknownProvider(provider_id.to_string()))?;
        if !provider.is_cloud() {
            return Err(ControllerError::NotCloudProvider(provider_id.to_string()));
        }

        let mut settings = SttSettings::load(&*self.config);
        if !settings.is_cloud_configured(provider_id) || !settings.is_verified(provider_id) {
            return Ok(CloudSelectOutcome::NeedsConfiguration);
        }

        self.backend
            .set_active_stt_provider(provider_id)
            .await
            .map_err(|e| {
                warn!("Failed to set STT provider to '{}': {}", provider_id, e);
                ControllerError::CloudSwitchFailed
            })?;

        settings.stt_provider_id = provider_id.to_string();
        settings.save(&*self.config).map_err(|e| {
            warn!("Failed to persist STT provider '{}': {}", provider_id, e);
            ControllerError::CloudSwitchFailed
        })?;
        self.store.set_active_stt_provider(provider_id);

        info!("STT provider switched to '{}'", provider_id);
        Ok(CloudSelectOutcome::Activated)
    }

    /// Forward a download request. Membership in `downloading_models` is
    /// driven by the backend's progress events, not by this call.
    pub async fn download(&self, model_id: &str) -> Result<(), ControllerError> {
        info!("Requesting download of '{}'", model_id);
        self.backend.start_download(model_id).await.map_err(|e| {
            warn!("Failed to start download for '{}': {}", model_id, e);
            ControllerError::DownloadFailed(model_id.to_string())
        })
    }

    /// Delete a local model after interactive confirmation. Declining is a
    /// no-op; backend failure never mutates the optimistic state.
    pub async fn delete(&self, model_id: &str) -> Result<DeleteOutcome, ControllerError> {
        let snapshot = self.store.snapshot();
        let catalog = self.catalog.current();
        let name = catalog
            .get(model_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| model_id.to_string());

        let is_active = snapshot.current_model == model_id
            && snapshot.active_stt_provider_id == LOCAL_PROVIDER_ID;
        let prompt = if is_active {
            DeletePrompt::ActiveModel { name }
        } else {
            DeletePrompt::Model { name }
        };

        if !self.confirm.confirm(prompt).await {
            return Ok(DeleteOutcome::Declined);
        }

        self.backend.delete_model(model_id).await.map_err(|e| {
            error!("Failed to delete model '{}': {}", model_id, e);
            ControllerError::DeleteFailed(model_id.to_string())
        })?;

        if is_active {
            // The backend unloads the model; clear the confirmed selection
            // so it does not resolve as active against a stale id.
            self.store.set_current_model("");
        }
        if let Err(e) = self.catalog.refresh(&*self.backend).await {
            warn!("Catalog refresh after delete failed: {}", e);
        }
        info!("Model '{}' deleted", model_id);
        Ok(DeleteOutcome::Deleted)
    }

    /// Forward a cancellation request. Deliberately does not clear
    /// `downloading_models`: the listener does once the backend confirms the
    /// download stopped, so the card never flashes "downloadable" and
    /// reverts if cancellation fails.
    pub async fn cancel(&self, model_id: &str) -> Result<(), ControllerError> {
        self.backend.cancel_download(model_id).await.map_err(|e| {
            warn!("Failed to cancel download for '{}': {}", model_id, e);
            ControllerError::CancelFailed(model_id.to_string())
        })
    }

    /// Verify a cloud provider's credentials. On success the key and model
    /// are persisted and the provider joins the verified set.
    pub async fn verify_cloud(
        &self,
        provider_id: &str,
        api_key: SecretString,
        model: &str,
    ) -> Result<(), ControllerError> {
        let catalog = self.catalog.current();
        let provider = catalog
            .get(provider_id)
            .ok_or_else(|| ControllerError::UnknownProvider(provider_id.to_string()))?;
        if !provider.is_cloud() {
            return Err(ControllerError::NotCloudProvider(provider_id.to_string()));
        }

        self.backend
            .verify_cloud_provider(provider_id, &api_key, model)
            .await
            .map_err(|e| {
                warn!("Verification failed for '{}': {}", provider_id, e);
                let message = if e.message.is_empty() {
                    "Verification failed".to_string()
                } else {
                    e.message
                };
                ControllerError::VerificationFailed(message)
            })?;

        let mut settings = SttSettings::load(&*self.config);
        settings.api_keys.insert(
            provider_id.to_string(),
            api_key.expose_secret().to_string(),
        );
        settings
            .cloud_models
            .insert(provider_id.to_string(), model.to_string());
        settings.verified_providers.insert(provider_id.to_string());
        settings
            .save(&*self.config)
            .map_err(|_| ControllerError::SettingsWrite)?;

        if let Err(e) = self.catalog.refresh(&*self.backend).await {
            warn!("Catalog refresh after verify failed: {}", e);
        }
        info!("Cloud provider '{}' verified", provider_id);
        Ok(())
    }

    /// Store a new API key. Changing the key drops the provider's verified
    /// status until `verify_cloud` succeeds again.
    pub fn update_api_key(&self, provider_id: &str, api_key: &str) -> Result<(), ControllerError> {
        let mut settings = SttSettings::load(&*self.config);
        if api_key.is_empty() {
            settings.api_keys.remove(provider_id);
        } else {
            settings
                .api_keys
                .insert(provider_id.to_string(), api_key.to_string());
        }
        settings.verified_providers.remove(provider_id);
        settings
            .save(&*self.config)
            .map_err(|_| ControllerError::SettingsWrite)
    }

    pub fn update_cloud_model(
        &self,
        provider_id: &str,
        model: &str,
    ) -> Result<(), ControllerError> {
        let mut settings = SttSettings::load(&*self.config);
        settings
            .cloud_models
            .insert(provider_id.to_string(), model.to_string());
        settings
            .save(&*self.config)
            .map_err(|_| ControllerError::SettingsWrite)
    }

    pub fn update_cloud_options(
        &self,
        provider_id: &str,
        options: serde_json::Value,
    ) -> Result<(), ControllerError> {
        let mut settings = SttSettings::load(&*self.config);
        settings
            .cloud_options
            .insert(provider_id.to_string(), options);
        settings
            .save(&*self.config)
            .map_err(|_| ControllerError::SettingsWrite)
    }

    pub fn set_realtime_enabled(
        &self,
        provider_id: &str,
        enabled: bool,
    ) -> Result<(), ControllerError> {
        let mut settings = SttSettings::load(&*self.config);
        settings
            .realtime_enabled
            .insert(provider_id.to_string(), enabled);
        settings
            .save(&*self.config)
            .map_err(|_| ControllerError::SettingsWrite)
    }
}
