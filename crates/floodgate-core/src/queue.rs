//! Bounded per-channel FIFO
//!
//! Many producers, one consumer (the channel's drain worker). Producers never
//! block: a full queue is reported as [`FloodgateError::QueueFull`] and the
//! queue is left untouched.

use crate::error::{FloodgateError, FloodgateResult};
use crate::message::PendingMessage;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// Bounded queue of messages for one channel
#[derive(Debug)]
pub struct ChannelQueue {
    channel: String,
    capacity: usize,
    items: Mutex<VecDeque<PendingMessage>>,
    notify: Notify,
}

impl ChannelQueue {
    pub fn new(channel: impl Into<String>, capacity: usize) -> Self {
        Self {
            channel: channel.into(),
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            notify: Notify::new(),
        }
    }

    /// Append a message; returns the new queue length
    pub async fn try_enqueue(&self, message: PendingMessage) -> FloodgateResult<usize> {
        let size = {
            let mut items = self.items.lock().await;
            if items.len() >= self.capacity {
                return Err(self.full());
            }
            items.push_back(message);
            items.len()
        };

        self.notify.notify_one();
        Ok(size)
    }

    /// Put a message back at the head so it is retried before newer ones
    pub async fn requeue_front(&self, message: PendingMessage) -> FloodgateResult<usize> {
        let size = {
            let mut items = self.items.lock().await;
            if items.len() >= self.capacity {
                return Err(self.full());
            }
            items.push_front(message);
            items.len()
        };

        self.notify.notify_one();
        Ok(size)
    }

    /// Take the next message, waiting up to `wait` for one to arrive
    ///
    /// Must only be called by the single consumer: a wake-up issued while no
    /// one is waiting is stored as one permit and consumed here.
    pub async fn next(&self, wait: Duration) -> Option<PendingMessage> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(message) = self.items.lock().await.pop_front() {
                return Some(message);
            }

            // A stale permit from an already-consumed push wakes us early; re-check
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Discard every queued message; returns how many were discarded
    pub async fn clear(&self) -> usize {
        let mut items = self.items.lock().await;
        let discarded = items.len();
        items.clear();
        discarded
    }

    /// Copy of the queued payloads in delivery order
    pub async fn peek_all(&self) -> Vec<PendingMessage> {
        self.items.lock().await.iter().cloned().collect()
    }

    fn full(&self) -> FloodgateError {
        FloodgateError::QueueFull {
            channel: self.channel.clone(),
            capacity: self.capacity,
        }
    }
}
