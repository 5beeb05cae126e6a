//! # Floodgate Testing
//!
//! Scripted transport for exercising [`BackpressureManager`] without a broker.
//!
//! [`MockChannel`] answers `subscriber_count` from a configurable table,
//! fails or succeeds `publish` on demand, and records every call so tests can
//! assert on what actually reached the transport.
//!
//! ```rust
//! use floodgate_core::PubSubChannel;
//! use floodgate_testing::MockChannel;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mock = MockChannel::new().with_subscribers("guide", 2).with_failures(1);
//!
//! assert_eq!(mock.subscriber_count("guide").await.unwrap(), 2);
//! assert!(mock.publish("guide", &json!(1)).await.is_err());
//! assert!(mock.publish("guide", &json!(2)).await.is_ok());
//! assert_eq!(mock.published("guide"), vec![json!(2)]);
//! # });
//! ```
//!
//! [`BackpressureManager`]: floodgate_core::BackpressureManager

use async_trait::async_trait;
use floodgate_core::{FloodgateError, FloodgateResult, PubSubChannel};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A transport call seen by [`MockChannel`]
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Publish { channel: String, payload: Value },
    SubscriberCount { channel: String },
}

#[derive(Debug, Default)]
struct MockState {
    subscribers: HashMap<String, usize>,
    default_subscribers: usize,
    /// Outcomes consumed by the next publish calls, front first
    scripted: VecDeque<Result<(), String>>,
    always_fail: Option<String>,
    subscriber_count_error: Option<String>,
    publish_delay: Option<Duration>,
    history: Vec<MockCall>,
    delivered: Vec<(String, Value)>,
}

/// Scripted [`PubSubChannel`] test double
///
/// Clones share state, so a test can keep one handle while the manager owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    /// A channel with no subscribers anywhere whose publishes succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriber count reported for one channel
    pub fn with_subscribers(self, channel: impl Into<String>, count: usize) -> Self {
        self.set_subscribers(channel, count);
        self
    }

    /// Subscriber count reported for channels without an explicit entry
    pub fn with_default_subscribers(self, count: usize) -> Self {
        self.lock().default_subscribers = count;
        self
    }

    /// Fail the next `count` publish calls, then succeed again
    pub fn with_failures(self, count: usize) -> Self {
        {
            let mut state = self.lock();
            for _ in 0..count {
                state
                    .scripted
                    .push_back(Err("scripted publish failure".to_string()));
            }
        }
        self
    }

    /// Delay every publish call, e.g. to hold a drain worker inside the transport
    pub fn with_publish_delay(self, delay: Duration) -> Self {
        self.lock().publish_delay = Some(delay);
        self
    }

    pub fn set_subscribers(&self, channel: impl Into<String>, count: usize) {
        self.lock().subscribers.insert(channel.into(), count);
    }

    /// Make every publish fail until [`MockChannel::recover`] is called
    pub fn fail_all(&self, error: impl Into<String>) {
        self.lock().always_fail = Some(error.into());
    }

    /// Make `subscriber_count` fail until [`MockChannel::recover`] is called
    pub fn fail_subscriber_count(&self, error: impl Into<String>) {
        self.lock().subscriber_count_error = Some(error.into());
    }

    /// Clear every configured failure, scripted ones included
    pub fn recover(&self) {
        let mut state = self.lock();
        state.always_fail = None;
        state.subscriber_count_error = None;
        state.scripted.clear();
    }

    /// Number of publish calls, successful or not
    pub fn publish_count(&self) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|call| matches!(call, MockCall::Publish { .. }))
            .count()
    }

    pub fn subscriber_count_calls(&self) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|call| matches!(call, MockCall::SubscriberCount { .. }))
            .count()
    }

    /// Payloads successfully published to `channel`, in order
    pub fn published(&self, channel: &str) -> Vec<Value> {
        self.lock()
            .delivered
            .iter()
            .filter(|(name, _)| name == channel)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.lock().delivered.len()
    }

    pub fn history(&self) -> Vec<MockCall> {
        self.lock().history.clone()
    }

    /// Forget recorded calls and deliveries; configuration is kept
    pub fn reset(&self) {
        let mut state = self.lock();
        state.history.clear();
        state.delivered.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PubSubChannel for MockChannel {
    async fn publish(&self, channel: &str, payload: &Value) -> FloodgateResult<()> {
        let (outcome, delay) = {
            let mut state = self.lock();
            state.history.push(MockCall::Publish {
                channel: channel.to_string(),
                payload: payload.clone(),
            });
            let scripted = state.scripted.pop_front();
            let outcome = match (&state.always_fail, scripted) {
                (Some(error), _) => Err(error.clone()),
                (None, Some(scripted)) => scripted,
                (None, None) => Ok(()),
            };
            (outcome, state.publish_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome.map_err(FloodgateError::Transport)?;

        self.lock()
            .delivered
            .push((channel.to_string(), payload.clone()));
        Ok(())
    }

    async fn subscriber_count(&self, channel: &str) -> FloodgateResult<usize> {
        let mut state = self.lock();
        state.history.push(MockCall::SubscriberCount {
            channel: channel.to_string(),
        });
        if let Some(error) = &state.subscriber_count_error {
            return Err(FloodgateError::Transport(error.clone()));
        }
        Ok(state
            .subscribers
            .get(channel)
            .copied()
            .unwrap_or(state.default_subscribers))
    }
}
