//! Output sink seam.
//!
//! The sink is the only resource shared across workers; implementations must
//! tolerate concurrent emission. Ownership of an event transfers to the sink
//! on `emit`.

use crate::resolver::CollectionRef;
use async_trait::async_trait;
use bson::Document;
use serde::Serialize;

/// The emitted unit: a normalized document tagged with its origin.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedEvent {
    pub message: Document,
    pub database: String,
    pub collection: String,
    /// BSON-serialized byte length of the original, pre-normalization document.
    pub message_size: u64,
}

impl NormalizedEvent {
    pub fn new(message: Document, target: &CollectionRef, message_size: u64) -> Self {
        Self {
            message,
            database: target.database.clone(),
            collection: target.collection.clone(),
            message_size,
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Enqueue an event for downstream processing.
    async fn emit(&self, event: NormalizedEvent) -> anyhow::Result<()>;
}

/// Sink backed by a tokio mpsc channel, for hosts that drain events from a
/// single consumer task.
pub struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<NormalizedEvent>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::Sender<NormalizedEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: NormalizedEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("event channel closed"))
    }
}
