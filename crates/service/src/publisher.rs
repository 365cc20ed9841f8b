//! Outbound publication of domain events.

use std::sync::Arc;

use async_trait::async_trait;
use domain::Event;
use tokio::sync::Mutex;

use crate::error::{Result, ServiceError};

/// Publishes events on named channels.
///
/// The channel is the event type name. Serialization and transport are up
/// to the implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &Event) -> Result<()>;
}

/// Records published events instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    published: Arc<Mutex<Vec<(String, Event)>>>,
}

impl InMemoryPublisher {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every channel/event pair published so far.
    pub async fn published(&self) -> Vec<(String, Event)> {
        self.published.lock().await.clone()
    }

    /// Returns the channels published to, in order.
    pub async fn channels(&self) -> Vec<String> {
        self.published
            .lock()
            .await
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, channel: &str, event: &Event) -> Result<()> {
        self.published
            .lock()
            .await
            .push((channel.to_string(), event.clone()));
        Ok(())
    }
}

/// Serializes events to JSON and writes them to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, channel: &str, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event).map_err(|err| ServiceError::Publish {
            channel: channel.to_string(),
            reason: err.to_string(),
        })?;
        tracing::info!(channel, %payload, "Event published");
        Ok(())
    }
}
