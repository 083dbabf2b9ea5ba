//! Event handlers invoked by the dispatcher.
//!
//! Delivery is at-least-once: a handler may see the same event more than
//! once (retries, a tick rolled back after the handler ran, a crash before
//! commit). Handlers must be idempotent.

pub mod asset_created;

use thiserror::Error;

use crate::domain::event::EventRecord;

pub use asset_created::{AssetCreatedHandler, AssetCreatedPayload};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Label used as the `exception` tag of the failure counter.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::InvalidPayload(_) => "InvalidPayload",
            HandlerError::Delivery(_) => "Delivery",
            HandlerError::Panicked(_) => "Panic",
        }
    }
}

/// Delivers one event type.
///
/// Any `Err` is treated as transient: the event is retried with backoff
/// until `max_attempts`, then dead-lettered.
pub trait OutboxEventHandler: Send + Sync + 'static {
    /// Event type this handler is registered under, e.g. `"AssetCreated"`.
    fn event_type(&self) -> &str;

    fn handle(&self, event: &EventRecord) -> Result<(), HandlerError>;
}
