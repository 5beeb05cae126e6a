//! Status reporting types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Normal operation, publishes go to the transport
    Closed,
    /// Channel considered failing, publishes are queued without a transport call
    Open,
    /// Trial attempts allowed to detect recovery
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }

    /// Numeric encoding for gauges (closed = 0, half-open = 1, open = 2)
    pub fn as_gauge(&self) -> i64 {
        match self {
            BreakerState::Closed => 0,
            BreakerState::HalfOpen => 1,
            BreakerState::Open => 2,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker counters at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub consecutive_successes: u32,
}

/// Status of a single channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Messages currently waiting in the queue
    pub queue_size: usize,
    /// Maximum queue length for this channel
    pub capacity: usize,
    pub breaker_state: BreakerState,
    pub failure_count: u32,
    pub consecutive_successes: u32,
    /// Messages delivered by the drain worker
    pub delivered: u64,
    /// Failed or deferred drain attempts put back at the head of the queue
    pub requeued: u64,
    /// Messages lost because the queue was full when they had to be requeued
    pub dropped: u64,
    /// Publish attempts rejected because the queue was full
    pub rejected: u64,
    pub worker_running: bool,
}

/// Status of every tracked channel, keyed by channel name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub channels: BTreeMap<String, ChannelStatus>,
}

impl QueueStatus {
    pub fn get(&self, channel: &str) -> Option<&ChannelStatus> {
        self.channels.get(channel)
    }

    /// Total messages queued across all channels
    pub fn total_queued(&self) -> usize {
        self.channels.values().map(|c| c.queue_size).sum()
    }

    /// Channels whose breaker is currently open
    pub fn open_channels(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|(_, c)| c.breaker_state == BreakerState::Open)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
