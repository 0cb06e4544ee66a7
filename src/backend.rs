//! Command/event boundary to the surrounding application.
//!
//! The download engine, the transcription engines, and capture all live
//! outside this crate. Commands go through the [`Backend`] trait;
//! notifications come back as a stream of [`BackendEvent`] values, fire and
//! forget, folded into the lifecycle store by the event listener.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::providers::Provider;

/// Failure reported by the backend collaborator. Carries the one short
/// message that may be surfaced to the user.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Commands this core issues to the surrounding application.
///
/// Every call is asynchronous; the caller stays responsive and shows
/// optimistic state while a call is in flight. The backend is the single
/// authority over which model is actually loaded.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Id of the model currently loaded in the inference engine, if any.
    async fn get_active_model_status(&self) -> Result<Option<String>, BackendError>;

    /// Whether a recording/capture session is running right now.
    async fn is_capture_in_progress(&self) -> Result<bool, BackendError>;

    /// Ask the engine to load a different local model. Confirmation arrives
    /// asynchronously as load-state events.
    async fn switch_active_model(&self, model_id: &str) -> Result<(), BackendError>;

    /// Start downloading a local model. Progress arrives as download events.
    async fn start_download(&self, model_id: &str) -> Result<(), BackendError>;

    /// Request cancellation of an in-flight download. Advisory: the download
    /// is only considered gone once the backend stops emitting progress.
    async fn cancel_download(&self, model_id: &str) -> Result<(), BackendError>;

    /// Delete a downloaded model from disk.
    async fn delete_model(&self, model_id: &str) -> Result<(), BackendError>;

    /// Check a cloud provider's credentials against its API.
    async fn verify_cloud_provider(
        &self,
        provider_id: &str,
        api_key: &SecretString,
        model: &str,
    ) -> Result<(), BackendError>;

    /// Persist which provider handles transcription ("local" or a cloud id).
    async fn set_active_stt_provider(&self, provider_id: &str) -> Result<(), BackendError>;

    /// Full provider list: local models with their on-disk state plus the
    /// cloud registry.
    async fn list_providers(&self) -> Result<Vec<Provider>, BackendError>;
}

/// Model load lifecycle notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LoadStateChanged {
    #[serde(rename_all = "camelCase")]
    Started { model_id: String },
    #[serde(rename_all = "camelCase")]
    Completed { model_id: String },
    #[serde(rename_all = "camelCase")]
    Failed {
        model_id: String,
        error: Option<String>,
    },
    Unloaded,
}

/// Download lifecycle notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DownloadStateChanged {
    #[serde(rename_all = "camelCase")]
    Progress {
        model_id: String,
        downloaded_bytes: u64,
        total_bytes: u64,
        /// 0..100.
        percentage: f64,
        /// Bytes per second.
        speed: f64,
    },
    /// Download finished, archive unpacking in progress.
    #[serde(rename_all = "camelCase")]
    Extracting { model_id: String },
    /// Download (and any extraction) finished; the artifact is usable.
    #[serde(rename_all = "camelCase")]
    Complete { model_id: String },
    #[serde(rename_all = "camelCase")]
    Failed { model_id: String, error: String },
}

/// Inbound notification stream, unordered relative to user-issued commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BackendEvent {
    ModelState(LoadStateChanged),
    Download(DownloadStateChanged),
}
