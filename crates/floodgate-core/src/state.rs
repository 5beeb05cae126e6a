//! Per-channel bookkeeping shared by the manager and the drain worker

use crate::breaker::CircuitBreaker;
use crate::config::BreakerConfig;
use crate::message::PendingMessage;
use crate::queue::ChannelQueue;
use crate::status::ChannelStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

/// Lifetime counters for one channel
#[derive(Debug, Default)]
pub struct ChannelCounters {
    delivered: AtomicU64,
    requeued: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

impl ChannelCounters {
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn requeued(&self) -> u64 {
        self.requeued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Queue, breaker and worker handle for one channel
///
/// Created once per channel name and kept until the manager shuts down.
#[derive(Debug)]
pub struct ChannelState {
    name: String,
    queue: ChannelQueue,
    breaker: Mutex<CircuitBreaker>,
    counters: ChannelCounters,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

impl ChannelState {
    pub fn new(name: impl Into<String>, capacity: usize, breaker: BreakerConfig) -> Self {
        let name = name.into();
        Self {
            queue: ChannelQueue::new(name.clone(), capacity),
            name,
            breaker: Mutex::new(CircuitBreaker::new(breaker)),
            counters: ChannelCounters::default(),
            worker: StdMutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &ChannelQueue {
        &self.queue
    }

    pub fn counters(&self) -> &ChannelCounters {
        &self.counters
    }

    pub async fn breaker_is_open(&self) -> bool {
        self.breaker.lock().await.is_open()
    }

    pub async fn record_success(&self) {
        self.breaker.lock().await.record_success();
    }

    pub async fn record_failure(&self) {
        self.breaker.lock().await.record_failure();
    }

    /// Put a message back at the head of the queue, dropping it if the queue
    /// filled up in the meantime. Returns whether the message was kept.
    pub async fn requeue_or_drop(&self, message: PendingMessage) -> bool {
        let id = message.id;
        match self.queue.requeue_front(message).await {
            Ok(_) => {
                self.counters.record_requeued();
                true
            }
            Err(e) => {
                self.counters.record_dropped();
                warn!(
                    channel = %self.name,
                    message_id = %id,
                    error = %e,
                    "Dropped message: queue full on requeue"
                );
                false
            }
        }
    }

    pub(crate) fn attach_worker(&self, handle: JoinHandle<()>) {
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub(crate) fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn worker_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn status(&self) -> ChannelStatus {
        let breaker = self.breaker.lock().await.snapshot();
        ChannelStatus {
            queue_size: self.queue.len().await,
            capacity: self.queue.capacity(),
            breaker_state: breaker.state,
            failure_count: breaker.failure_count,
            consecutive_successes: breaker.consecutive_successes,
            delivered: self.counters.delivered(),
            requeued: self.counters.requeued(),
            dropped: self.counters.dropped(),
            rejected: self.counters.rejected(),
            worker_running: self.worker_running(),
        }
    }
}
