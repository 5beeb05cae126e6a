//! Transport seam consumed by the delivery layer

use crate::error::{FloodgateError, FloodgateResult};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

/// Pub/sub transport capability
///
/// Every adapter (Redis, in-memory, test doubles) implements this explicitly.
/// Timeouts are the transport's responsibility.
///
/// # Example
///
/// ```rust
/// use floodgate_core::{InMemoryPubSub, PubSubChannel};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let pubsub = InMemoryPubSub::new();
/// let mut rx = pubsub.subscribe("guide");
///
/// assert_eq!(pubsub.subscriber_count("guide").await.unwrap(), 1);
/// pubsub.publish("guide", &json!({"type": "hello"})).await.unwrap();
/// assert_eq!(rx.recv().await.unwrap()["type"], "hello");
/// # });
/// ```
#[async_trait]
pub trait PubSubChannel: Send + Sync {
    /// Publish a payload to a channel
    ///
    /// # Errors
    ///
    /// Returns `FloodgateError::Transport` if the transport could not accept
    /// the message.
    async fn publish(&self, channel: &str, payload: &Value) -> FloodgateResult<()>;

    /// Number of consumers currently subscribed to a channel (0 = none)
    async fn subscriber_count(&self, channel: &str) -> FloodgateResult<usize>;
}

/// Default capacity of each in-memory broadcast channel
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Process-local pub/sub transport over `tokio::sync::broadcast`
///
/// Publishing to a channel nobody listens to succeeds and the payload is lost,
/// matching how network pub/sub brokers behave.
#[derive(Debug)]
pub struct InMemoryPubSub {
    channels: DashMap<String, broadcast::Sender<Value>>,
    buffer: usize,
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPubSub {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Per-channel buffer used for lagging subscribers
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            channels: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Subscribe to a channel, creating it if needed
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Value> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe()
    }

    /// Number of channels that currently hold a broadcast sender
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Forget a channel once its last receiver is gone
    fn prune(&self, channel: &str) {
        if self
            .channels
            .remove_if(channel, |_, sender| sender.receiver_count() == 0)
            .is_some()
        {
            debug!(channel, "Removed channel without subscribers");
        }
    }
}

#[async_trait]
impl PubSubChannel for InMemoryPubSub {
    async fn publish(&self, channel: &str, payload: &Value) -> FloodgateResult<()> {
        // `send` only fails when every receiver has been dropped
        let sent = match self.channels.get(channel) {
            Some(sender) => sender.send(payload.clone()).is_ok(),
            None => {
                debug!(channel, "Published to channel with no subscribers");
                return Ok(());
            }
        };

        if !sent {
            debug!(channel, "Published to channel whose subscribers all left");
            self.prune(channel);
        }
        Ok(())
    }

    async fn subscriber_count(&self, channel: &str) -> FloodgateResult<usize> {
        let count = self
            .channels
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0);
        if count == 0 {
            self.prune(channel);
        }
        Ok(count)
    }
}

#[async_trait]
impl<T: PubSubChannel + ?Sized> PubSubChannel for std::sync::Arc<T> {
    async fn publish(&self, channel: &str, payload: &Value) -> FloodgateResult<()> {
        (**self).publish(channel, payload).await
    }

    async fn subscriber_count(&self, channel: &str) -> FloodgateResult<usize> {
        (**self).subscriber_count(channel).await
    }
}

/// Reject names that cannot be used as channel keys
pub(crate) fn validate_channel_name(channel: &str) -> FloodgateResult<()> {
    if channel.is_empty() {
        return Err(FloodgateError::InvalidChannel(
            "channel name cannot be empty".to_string(),
        ));
    }
    if channel.trim() != channel {
        return Err(FloodgateError::InvalidChannel(format!(
            "channel name '{channel}' has leading or trailing whitespace"
        )));
    }
    if channel.chars().any(char::is_control) {
        return Err(FloodgateError::InvalidChannel(format!(
            "channel name '{}' contains control characters",
            channel.escape_debug()
        )));
    }
    Ok(())
}
