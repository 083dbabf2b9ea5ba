use log::info;
use serde::{Deserialize, Serialize};

use super::{HandlerError, OutboxEventHandler};
use crate::domain::event::{EventRecord, NewEvent, TraceContext};

pub const ASSET_AGGREGATE: &str = "Asset";
pub const ASSET_CREATED: &str = "AssetCreated";

/// Payload written by the asset service when an asset is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCreatedPayload {
    pub id: i64,
    pub name: String,
}

impl AssetCreatedPayload {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Outbox event announcing this asset.
    pub fn into_event(self, trace: TraceContext) -> Result<NewEvent, serde_json::Error> {
        let payload = serde_json::to_string(&self)?;
        Ok(
            NewEvent::new(ASSET_AGGREGATE, self.id.to_string(), ASSET_CREATED, payload)
                .with_trace(trace),
        )
    }
}

/// Logs each created asset. Stands in for a broker publisher.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssetCreatedHandler;

impl OutboxEventHandler for AssetCreatedHandler {
    fn event_type(&self) -> &str {
        ASSET_CREATED
    }

    fn handle(&self, event: &EventRecord) -> Result<(), HandlerError> {
        let asset: AssetCreatedPayload = serde_json::from_str(event.payload())?;
        info!(
            "Handled AssetCreated event id={} aggregate={}#{} asset_name={} correlation_id={}",
            event.id(),
            event.aggregate_type(),
            event.aggregate_id(),
            asset.name,
            event.correlation_id().unwrap_or("-"),
        );
        Ok(())
    }
}
