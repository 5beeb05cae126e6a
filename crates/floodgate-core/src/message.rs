//! Messages waiting for delivery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A message parked in a channel queue until the drain worker delivers it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    /// Correlation id for logs
    pub id: Uuid,
    pub channel: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    /// Delivery attempts made by the drain worker so far
    pub attempts: u32,
}

impl PendingMessage {
    pub fn new(channel: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }

    /// Time spent waiting since the message was first queued
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.enqueued_at
    }
}
