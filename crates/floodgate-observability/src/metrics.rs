//! Prometheus export of channel queue status
//!
//! Series are refreshed from a [`QueueStatus`] snapshot rather than updated on
//! the publish path. Lifetime counters in the snapshot only move forward, so
//! they are exported as counters by adding the difference since the last
//! observation.
//!
//! Channel names are unbounded, so the number of distinct `channel` label
//! values is capped; channels past the cap are counted but not exported.

use floodgate_core::{ChannelStatus, QueueStatus};
use prometheus::{
    Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::collections::HashSet;
use std::sync::RwLock;
use thiserror::Error;
use tracing::warn;

/// Per-channel queue and breaker series in a dedicated registry
#[derive(Debug)]
pub struct QueueMetrics {
    registry: Registry,
    max_channel_labels: usize,
    tracked: RwLock<HashSet<String>>,

    queue_depth: IntGaugeVec,        // cardinality: ≤max_channel_labels
    queue_capacity: IntGaugeVec,     // cardinality: ≤max_channel_labels
    breaker_state: IntGaugeVec,      // cardinality: ≤max_channel_labels
    breaker_failures: IntGaugeVec,   // cardinality: ≤max_channel_labels
    messages_total: IntCounterVec,   // cardinality: ≤max_channel_labels × 4
    untracked_channels: IntGauge,    // cardinality: 1
}

impl QueueMetrics {
    pub fn new(namespace: &str, max_channel_labels: usize) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let queue_depth = IntGaugeVec::new(
            Opts::new("queue_depth", "Messages waiting in the channel queue").namespace(namespace),
            &["channel"],
        )?;
        let queue_capacity = IntGaugeVec::new(
            Opts::new("queue_capacity", "Maximum messages the channel queue holds")
                .namespace(namespace),
            &["channel"],
        )?;
        let breaker_state = IntGaugeVec::new(
            Opts::new(
                "breaker_state",
                "Circuit breaker state (0=closed, 1=half_open, 2=open)",
            )
            .namespace(namespace),
            &["channel"],
        )?;
        let breaker_failures = IntGaugeVec::new(
            Opts::new("breaker_failures", "Failures counted by the circuit breaker")
                .namespace(namespace),
            &["channel"],
        )?;
        let messages_total = IntCounterVec::new(
            Opts::new(
                "messages_total",
                "Queued message outcomes (delivered, requeued, dropped, rejected)",
            )
            .namespace(namespace),
            &["channel", "outcome"],
        )?;
        let untracked_channels = IntGauge::with_opts(
            Opts::new(
                "untracked_channels",
                "Channels left out of per-channel series by the label limit",
            )
            .namespace(namespace),
        )?;

        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(queue_capacity.clone()))?;
        registry.register(Box::new(breaker_state.clone()))?;
        registry.register(Box::new(breaker_failures.clone()))?;
        registry.register(Box::new(messages_total.clone()))?;
        registry.register(Box::new(untracked_channels.clone()))?;

        Ok(Self {
            registry,
            max_channel_labels,
            tracked: RwLock::new(HashSet::new()),
            queue_depth,
            queue_capacity,
            breaker_state,
            breaker_failures,
            messages_total,
            untracked_channels,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Refresh every series from a status snapshot
    ///
    /// Returns how many channels were left out because of the label limit.
    pub fn observe(&self, status: &QueueStatus) -> Result<usize, MetricsError> {
        let mut skipped = 0;
        for (name, channel) in &status.channels {
            match self.record_channel(name, channel) {
                Ok(()) => {}
                Err(MetricsError::CardinalityViolation { .. }) => skipped += 1,
                Err(e) => return Err(e),
            }
        }

        if skipped > 0 {
            warn!(
                skipped,
                limit = self.max_channel_labels,
                "Channel label limit reached, some channels not exported"
            );
        }
        self.untracked_channels.set(to_i64(skipped));
        Ok(skipped)
    }

    /// Refresh the series of one channel
    ///
    /// # Errors
    ///
    /// Returns `CardinalityViolation` if the channel is new and the label
    /// limit is already reached.
    pub fn record_channel(&self, name: &str, status: &ChannelStatus) -> Result<(), MetricsError> {
        self.track(name)?;

        self.queue_depth
            .with_label_values(&[name])
            .set(to_i64(status.queue_size));
        self.queue_capacity
            .with_label_values(&[name])
            .set(to_i64(status.capacity));
        self.breaker_state
            .with_label_values(&[name])
            .set(status.breaker_state.as_gauge());
        self.breaker_failures
            .with_label_values(&[name])
            .set(i64::from(status.failure_count));

        for (outcome, value) in [
            ("delivered", status.delivered),
            ("requeued", status.requeued),
            ("dropped", status.dropped),
            ("rejected", status.rejected),
        ] {
            let counter = self.messages_total.with_label_values(&[name, outcome]);
            let current = counter.get();
            if value > current {
                counter.inc_by(value - current);
            }
        }
        Ok(())
    }

    /// Number of channels currently exported
    pub fn tracked_channels(&self) -> usize {
        self.tracked.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Text exposition format of every series
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    fn track(&self, name: &str) -> Result<(), MetricsError> {
        if self
            .tracked
            .read()
            .map_err(|_| MetricsError::CardinalityTracking("Failed to acquire read lock".into()))?
            .contains(name)
        {
            return Ok(());
        }

        let mut tracked = self
            .tracked
            .write()
            .map_err(|_| MetricsError::CardinalityTracking("Failed to acquire write lock".into()))?;
        if !tracked.contains(name) {
            if tracked.len() >= self.max_channel_labels {
                return Err(MetricsError::CardinalityViolation {
                    metric: "channel".to_string(),
                    limit: self.max_channel_labels,
                    current: tracked.len(),
                });
            }
            tracked.insert(name.to_string());
        }
        Ok(())
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Cardinality violation for metric {metric}: {current} >= {limit}")]
    CardinalityViolation {
        metric: String,
        limit: usize,
        current: usize,
    },

    #[error("Cardinality tracking error: {0}")]
    CardinalityTracking(String),

    #[error("Metrics encoding failed: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use floodgate_core::BreakerState;

    fn channel(queue_size: usize, state: BreakerState, delivered: u64) -> ChannelStatus {
        ChannelStatus {
            queue_size,
            capacity: 1000,
            breaker_state: state,
            failure_count: if state == BreakerState::Open { 5 } else { 0 },
            consecutive_successes: 0,
            delivered,
            requeued: 0,
            dropped: 0,
            rejected: 0,
            worker_running: true,
        }
    }

    fn status(channels: &[(&str, ChannelStatus)]) -> QueueStatus {
        QueueStatus {
            channels: channels
                .iter()
                .map(|(name, c)| (name.to_string(), c.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_render_contains_channel_series() {
        let metrics = QueueMetrics::new("floodgate", 10).unwrap();
        let snapshot = status(&[
            ("guide", channel(3, BreakerState::Open, 7)),
            ("news", channel(0, BreakerState::Closed, 1)),
        ]);
        assert_eq!(metrics.observe(&snapshot).unwrap(), 0);

        let text = metrics.render().unwrap();
        assert!(text.contains("floodgate_queue_depth{channel=\"guide\"} 3"));
        assert!(text.contains("floodgate_breaker_state{channel=\"guide\"} 2"));
        assert!(text.contains("floodgate_breaker_state{channel=\"news\"} 0"));
        assert!(
            text.contains("floodgate_messages_total{channel=\"guide\",outcome=\"delivered\"} 7")
        );
    }

    #[test]
    fn test_counters_follow_snapshots() {
        let metrics = QueueMetrics::new("fg", 10).unwrap();
        metrics
            .observe(&status(&[("guide", channel(0, BreakerState::Closed, 2))]))
            .unwrap();
        metrics
            .observe(&status(&[("guide", channel(0, BreakerState::Closed, 5))]))
            .unwrap();

        let delivered = metrics
            .messages_total
            .with_label_values(&["guide", "delivered"])
            .get();
        assert_eq!(delivered, 5);
    }

    #[test]
    fn test_label_limit_skips_new_channels() {
        let metrics = QueueMetrics::new("fg", 2).unwrap();
        let snapshot = status(&[
            ("a", channel(1, BreakerState::Closed, 0)),
            ("b", channel(1, BreakerState::Closed, 0)),
            ("c", channel(1, BreakerState::Closed, 0)),
        ]);

        assert_eq!(metrics.observe(&snapshot).unwrap(), 1);
        assert_eq!(metrics.tracked_channels(), 2);
        assert_eq!(metrics.untracked_channels.get(), 1);

        let err = metrics
            .record_channel("d", &channel(0, BreakerState::Closed, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            MetricsError::CardinalityViolation { limit: 2, .. }
        ));

        // Already tracked channels keep updating
        assert!(
            metrics
                .record_channel("a", &channel(9, BreakerState::Closed, 0))
                .is_ok()
        );
    }
}
