//! Backpressure manager: routing of every publish attempt
//!
//! For each call the manager picks one of three routes:
//!
//! 1. breaker open: queue without touching the transport
//! 2. no subscribers: queue, a later subscriber may still get the backlog
//! 3. otherwise publish; on transport failure record it and queue instead
//!
//! Channel bookkeeping is created on first use and owned by the manager until
//! [`BackpressureManager::shutdown`].

use crate::channel::{PubSubChannel, validate_channel_name};
use crate::config::BackpressureConfig;
use crate::error::{FloodgateError, FloodgateResult};
use crate::message::PendingMessage;
use crate::state::ChannelState;
use crate::status::QueueStatus;
use crate::worker::DrainWorker;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// How a publish attempt was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// Delivered to the transport right away
    Published,
    /// Parked in the channel queue for the drain worker
    Queued,
    /// Queue at capacity; the message was not accepted
    Rejected,
    /// Internal failure; the message was not accepted
    Error,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Published => "published",
            PublishStatus::Queued => "queued",
            PublishStatus::Rejected => "rejected",
            PublishStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`BackpressureManager::publish_with_backpressure`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub status: PublishStatus,
    /// Channel queue length after this call
    pub queue_size: usize,
    /// Subscriber count observed by this call (0 when the transport was skipped)
    pub subscribers: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishOutcome {
    fn published(queue_size: usize, subscribers: usize) -> Self {
        Self {
            status: PublishStatus::Published,
            queue_size,
            subscribers,
            error: None,
        }
    }

    fn queued(queue_size: usize, subscribers: usize) -> Self {
        Self {
            status: PublishStatus::Queued,
            queue_size,
            subscribers,
            error: None,
        }
    }

    fn rejected(queue_size: usize, subscribers: usize) -> Self {
        Self {
            status: PublishStatus::Rejected,
            queue_size,
            subscribers,
            error: None,
        }
    }

    fn error(error: &FloodgateError) -> Self {
        Self {
            status: PublishStatus::Error,
            queue_size: 0,
            subscribers: 0,
            error: Some(error.to_string()),
        }
    }

    /// Whether the message was taken (published now or queued for later)
    pub fn is_accepted(&self) -> bool {
        matches!(
            self.status,
            PublishStatus::Published | PublishStatus::Queued
        )
    }
}

/// Per-channel breakers, queues and drain workers over one transport
///
/// # Example
///
/// ```rust
/// use floodgate_core::{BackpressureConfig, BackpressureManager, InMemoryPubSub, PublishStatus};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let pubsub = Arc::new(InMemoryPubSub::new());
/// let _rx = pubsub.subscribe("guide");
/// let manager = BackpressureManager::new(pubsub, BackpressureConfig::default());
///
/// let outcome = manager
///     .publish_with_backpressure("guide", json!({"type": "update"}), None)
///     .await;
/// assert_eq!(outcome.status, PublishStatus::Published);
/// assert_eq!(outcome.subscribers, 1);
///
/// manager.shutdown().await;
/// # });
/// ```
pub struct BackpressureManager {
    transport: Arc<dyn PubSubChannel>,
    config: BackpressureConfig,
    channels: DashMap<String, Arc<ChannelState>>,
    shutdown_tx: watch::Sender<bool>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for BackpressureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackpressureManager")
            .field("config", &self.config)
            .field("channels", &self.channels.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl BackpressureManager {
    /// Create a manager over `transport`
    ///
    /// A config that fails [`BackpressureConfig::validate`] is replaced by the
    /// defaults.
    pub fn new(transport: Arc<dyn PubSubChannel>, config: BackpressureConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(error = %e, "Invalid backpressure config, using defaults");
                BackpressureConfig::default()
            }
        };
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            transport,
            config,
            channels: DashMap::new(),
            shutdown_tx,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BackpressureConfig {
        &self.config
    }

    /// Publish now, queue for later, or reject
    ///
    /// Never fails: every outcome, including internal errors, is reported in
    /// the returned [`PublishOutcome`]. `max_queue_size` only takes effect when
    /// this call creates the channel.
    pub async fn publish_with_backpressure(
        &self,
        channel: &str,
        message: Value,
        max_queue_size: Option<usize>,
    ) -> PublishOutcome {
        let state = match self.resolve_channel(channel, max_queue_size) {
            Ok(state) => state,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Publish refused");
                return PublishOutcome::error(&e);
            }
        };

        if state.breaker_is_open().await {
            debug!(channel = %channel, "Breaker open, queueing message");
            return self.enqueue(&state, message, 0).await;
        }

        let subscribers = match self.transport.subscriber_count(channel).await {
            Ok(count) => count,
            Err(e) => {
                state.record_failure().await;
                warn!(channel = %channel, error = %e, "Subscriber count failed, queueing message");
                return self.enqueue(&state, message, 0).await;
            }
        };

        if self.is_shut_down() {
            return PublishOutcome::error(&FloodgateError::ShutDown);
        }

        if subscribers == 0 {
            debug!(channel = %channel, "No subscribers, queueing message");
            return self.enqueue(&state, message, 0).await;
        }

        match self.transport.publish(channel, &message).await {
            Ok(()) => {
                state.record_success().await;
                PublishOutcome::published(state.queue().len().await, subscribers)
            }
            Err(e) => {
                state.record_failure().await;
                warn!(channel = %channel, error = %e, "Publish failed, queueing message");
                self.enqueue(&state, message, subscribers).await
            }
        }
    }

    /// Status of one channel, or of every channel when `channel` is `None`
    ///
    /// An unknown channel yields an empty map.
    pub async fn queue_status(&self, channel: Option<&str>) -> QueueStatus {
        let states: Vec<Arc<ChannelState>> = match channel {
            Some(name) => self
                .channels
                .get(name)
                .map(|entry| Arc::clone(entry.value()))
                .into_iter()
                .collect(),
            None => self
                .channels
                .iter()
                .map(|entry| Arc::clone(entry.value()))
                .collect(),
        };

        let mut status = QueueStatus::default();
        for state in states {
            status
                .channels
                .insert(state.name().to_string(), state.status().await);
        }
        status
    }

    /// Names of every channel with bookkeeping, sorted
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop every drain worker and discard whatever is still queued
    ///
    /// Workers share one `shutdown_grace` deadline to reach a wait point;
    /// workers still stuck in a transport call at the deadline are aborted.
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Backpressure manager already shut down");
            return;
        }
        self.shutdown_tx.send_replace(true);

        let states: Vec<Arc<ChannelState>> = self
            .channels
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.channels.clear();

        let workers: Vec<_> = states
            .iter()
            .filter_map(|state| state.take_worker().map(|handle| (state.name(), handle)))
            .collect();

        let deadline = Instant::now() + self.config.shutdown_grace;
        let mut aborted = 0;
        for (name, mut handle) in workers {
            if timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                aborted += 1;
                warn!(channel = %name, "Drain worker did not stop in time, aborted");
            }
        }

        let mut discarded = 0;
        for state in &states {
            discarded += state.queue().clear().await;
        }

        info!(
            channels = states.len(),
            aborted, discarded, "Backpressure manager shut down"
        );
    }

    fn resolve_channel(
        &self,
        channel: &str,
        max_queue_size: Option<usize>,
    ) -> FloodgateResult<Arc<ChannelState>> {
        if self.is_shut_down() {
            return Err(FloodgateError::ShutDown);
        }
        if let Some(existing) = self.channels.get(channel) {
            return Ok(Arc::clone(existing.value()));
        }

        validate_channel_name(channel)?;
        let capacity = max_queue_size.unwrap_or(self.config.default_queue_capacity);
        if capacity == 0 {
            return Err(FloodgateError::InvalidConfig(
                "max_queue_size must be greater than 0".to_string(),
            ));
        }

        let state = self
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| self.create_channel(channel, capacity));
        Ok(Arc::clone(state.value()))
    }

    /// Build bookkeeping for a new channel and start its drain worker
    fn create_channel(&self, channel: &str, capacity: usize) -> Arc<ChannelState> {
        let state = Arc::new(ChannelState::new(channel, capacity, self.config.breaker));
        let handle = DrainWorker::new(
            Arc::clone(&state),
            Arc::clone(&self.transport),
            self.config.drain,
            self.shutdown_tx.subscribe(),
        )
        .spawn();
        state.attach_worker(handle);

        info!(channel = %channel, capacity, "Created channel queue and drain worker");
        state
    }

    async fn enqueue(
        &self,
        state: &ChannelState,
        message: Value,
        subscribers: usize,
    ) -> PublishOutcome {
        if self.is_shut_down() {
            return PublishOutcome::error(&FloodgateError::ShutDown);
        }

        let pending = PendingMessage::new(state.name(), message);
        match state.queue().try_enqueue(pending).await {
            // Shutdown may have cleared the queue before this push landed
            Ok(_) if self.is_shut_down() => {
                state.queue().clear().await;
                PublishOutcome::error(&FloodgateError::ShutDown)
            }
            Ok(size) => PublishOutcome::queued(size, subscribers),
            Err(FloodgateError::QueueFull { capacity, .. }) => {
                state.counters().record_rejected();
                warn!(channel = %state.name(), capacity, "Queue full, message rejected");
                PublishOutcome::rejected(state.queue().len().await, subscribers)
            }
            Err(e) => PublishOutcome::error(&e),
        }
    }
}

impl Drop for BackpressureManager {
    fn drop(&mut self) {
        // Workers must not outlive the manager that owns their queues
        self.shutdown_tx.send_replace(true);
    }
}
