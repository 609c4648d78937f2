//! Update-bus seam and the message shapes that travel over it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as Json;
use thiserror::Error;
use tracing::warn;

/// Service name prefix stamped onto every outbound message type.
pub const SERVICE_NAME: &str = "Mediateca";

#[derive(Debug, Error)]
pub enum BusError {
    #[error("update bus unavailable: {0}")]
    Unavailable(String),
}

/// Client-facing update pushed after a mutation. `device_id` is the
/// wildcard target; `excluded_device_id` keeps the mutating device from
/// echoing its own change back.
#[derive(Debug, Clone)]
pub struct UpdateMessage {
    pub kind: String,
    pub device_id: String,
    pub excluded_device_id: Option<String>,
    pub data: Json,
}

impl UpdateMessage {
    fn broadcast(event: &str, data: Json, excluded_device_id: Option<String>) -> Self {
        Self {
            kind: format!("{SERVICE_NAME}#Content#{event}"),
            device_id: "*".to_owned(),
            excluded_device_id,
            data,
        }
    }

    pub fn content_update(data: Json, excluded_device_id: Option<String>) -> Self {
        Self::broadcast("Update", data, excluded_device_id)
    }

    pub fn content_counters(data: Json, excluded_device_id: Option<String>) -> Self {
        Self::broadcast("Counters", data, excluded_device_id)
    }

    pub fn content_delete(data: Json) -> Self {
        Self::broadcast("Delete", data, None)
    }
}

/// Message received from a sibling service over the bus.
#[derive(Debug, Clone)]
pub struct PeerMessage {
    pub kind: String,
    pub data: Json,
}

#[async_trait]
pub trait UpdateBus: Send + Sync {
    async fn publish(&self, message: UpdateMessage) -> Result<(), BusError>;
}

/// Publishes without blocking the calling request. Delivery failures
/// are logged and dropped; mutations never fail on bus trouble.
pub fn publish_detached(bus: Arc<dyn UpdateBus>, message: UpdateMessage) {
    tokio::spawn(async move {
        let kind = message.kind.clone();
        if let Err(error) = bus.publish(message).await {
            warn!(%kind, %error, "update message dropped");
        }
    });
}
