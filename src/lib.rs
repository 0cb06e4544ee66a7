//! Provider lifecycle management for a speech-to-text application.
//!
//! A [`providers::SelectionController`] issues commands against a host
//! [`backend::Backend`] and writes optimistic state into the
//! [`providers::LifecycleStore`]; a [`providers::EventListener`] folds the
//! backend's asynchronous notifications into the same store. Status shown
//! for any provider is derived on demand by [`providers::resolve_status`],
//! never stored.

pub mod backend;
pub mod config;
pub mod error;
pub mod providers;

pub use error::Error;
