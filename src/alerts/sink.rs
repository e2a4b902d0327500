//! Notification delivery.

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::models::{AlertNotification, Channel};

/// A channel refused a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Delivery over {channel} failed: {message}")]
pub struct DeliveryError {
    /// The failing channel.
    pub channel: Channel,
    /// Failure description.
    pub message: String,
}

/// Delivers fired notifications to their channels.
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification over one channel.
    fn deliver(&self, channel: Channel, notification: &AlertNotification) -> Result<(), DeliveryError>;
}

/// A sink that keeps every delivery in memory.
///
/// Channels listed in `refuse` fail, which lets callers observe delivery
/// errors without a real transport.
#[derive(Debug, Default)]
pub struct OutboxSink {
    delivered: Mutex<Vec<(Channel, AlertNotification)>>,
    refuse: Vec<Channel>,
}

impl OutboxSink {
    /// Creates an outbox accepting every channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an outbox that fails deliveries over `channels`.
    pub fn refusing(channels: &[Channel]) -> Self {
        Self {
            delivered: Mutex::default(),
            refuse: channels.to_vec(),
        }
    }

    /// Returns the deliveries made so far, oldest first.
    pub fn delivered(&self) -> Vec<(Channel, AlertNotification)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for OutboxSink {
    fn deliver(&self, channel: Channel, notification: &AlertNotification) -> Result<(), DeliveryError> {
        if self.refuse.contains(&channel) {
            return Err(DeliveryError {
                channel,
                message: "channel unavailable".to_string(),
            });
        }
        debug!(%channel, notification_id = %notification.id, "Notification queued");
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel, notification.clone()));
        Ok(())
    }
}
