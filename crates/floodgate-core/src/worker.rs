//! Drain worker: one background task per channel
//!
//! # Loop
//! ```text
//! wait ≤ poll_interval for a message ──none──► loop
//!        │
//!        ▼
//! breaker open? ──yes──► requeue at front (drop if full), sleep open_backoff
//!        │ no
//!        ▼
//! transport.publish ──ok──► record_success, message delivered
//!        │ err
//!        ▼
//! record_failure, requeue at front (drop if full), sleep failure_backoff
//! ```
//!
//! Every wait point also watches the shutdown signal. Transport calls already
//! in flight are not interrupted by the signal itself.

use crate::channel::PubSubChannel;
use crate::config::DrainConfig;
use crate::state::ChannelState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

pub struct DrainWorker {
    state: Arc<ChannelState>,
    transport: Arc<dyn PubSubChannel>,
    config: DrainConfig,
    shutdown: watch::Receiver<bool>,
}

impl DrainWorker {
    pub fn new(
        state: Arc<ChannelState>,
        transport: Arc<dyn PubSubChannel>,
        config: DrainConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state,
            transport,
            config,
            shutdown,
        }
    }

    /// Start the worker on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let channel = self.state.name().to_string();
        debug!(channel = %channel, "Drain worker started");

        while !self.is_shutting_down() {
            let next = tokio::select! {
                message = self.state.queue().next(self.config.poll_interval) => message,
                _ = self.shutdown.changed() => break,
            };
            let Some(mut message) = next else {
                continue;
            };

            if self.state.breaker_is_open().await {
                trace!(channel = %channel, message_id = %message.id, "Breaker open, deferring message");
                self.state.requeue_or_drop(message).await;
                if !self.pause(self.config.open_backoff).await {
                    break;
                }
                continue;
            }

            message.attempts = message.attempts.saturating_add(1);
            match self.transport.publish(&channel, &message.payload).await {
                Ok(()) => {
                    self.state.record_success().await;
                    self.state.counters().record_delivered();
                    debug!(
                        channel = %channel,
                        message_id = %message.id,
                        attempts = message.attempts,
                        "Delivered queued message"
                    );
                }
                Err(e) => {
                    self.state.record_failure().await;
                    warn!(
                        channel = %channel,
                        message_id = %message.id,
                        attempts = message.attempts,
                        error = %e,
                        "Queued delivery failed, requeueing"
                    );
                    self.state.requeue_or_drop(message).await;
                    if !self.pause(self.config.failure_backoff).await {
                        break;
                    }
                }
            }
        }

        let discarded = self.state.queue().clear().await;
        if discarded > 0 {
            warn!(channel = %channel, discarded, "Drain worker stopped, discarding queued messages");
        } else {
            info!(channel = %channel, "Drain worker stopped");
        }
    }

    /// Sleep unless shutdown arrives first; returns false on shutdown
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.changed() => false,
        }
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}
