//! Outbound notifications to people.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

/// Sends a message to a destination such as a mailbox.
#[async_trait]
pub trait Notifications: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<()>;
}

/// A notification captured by [`InMemoryNotifications`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub destination: String,
    pub message: String,
}

/// Records notifications instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifications {
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl InMemoryNotifications {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notification sent so far.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }

    /// Returns the messages sent to one destination.
    pub async fn sent_to(&self, destination: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|sent| sent.destination == destination)
            .map(|sent| sent.message.clone())
            .collect()
    }
}

#[async_trait]
impl Notifications for InMemoryNotifications {
    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        self.sent.lock().await.push(SentNotification {
            destination: destination.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifications;

#[async_trait]
impl Notifications for LoggingNotifications {
    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        tracing::info!(destination, message, "Notification sent");
        Ok(())
    }
}
