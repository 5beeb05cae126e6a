//! Per-channel circuit breaker
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     failure_count >= failure_threshold
//! Open     → HalfOpen: checked lazily by is_open() once recovery_timeout elapsed
//! HalfOpen → Closed:   success_threshold consecutive successes
//! HalfOpen → Open:     any failure
//! ```
//!
//! The recovery timeout is fixed; there is no exponential backoff or jitter.

use crate::config::BreakerConfig;
use crate::status::{BreakerSnapshot, BreakerState};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Failure-tracking state machine guarding one channel
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    failure_count: u32,
    consecutive_successes: u32,
    last_failure_time: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            failure_count: 0,
            consecutive_successes: 0,
            last_failure_time: None,
        }
    }

    /// Whether calls should be kept away from the channel
    ///
    /// An open breaker whose recovery timeout has elapsed moves to half-open
    /// here and lets this call through as a trial.
    pub fn is_open(&mut self) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => false,
            BreakerState::Open => {
                let recovered = self
                    .last_failure_time
                    .is_none_or(|at| at.elapsed() >= self.config.recovery_timeout);

                if recovered {
                    self.state = BreakerState::HalfOpen;
                    self.consecutive_successes = 0;
                    debug!(
                        failure_count = self.failure_count,
                        "Circuit breaker half-open, allowing trial attempt"
                    );
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Record a successful delivery
    pub fn record_success(&mut self) {
        match self.state {
            BreakerState::HalfOpen => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.config.success_threshold {
                    self.state = BreakerState::Closed;
                    self.failure_count = 0;
                    self.consecutive_successes = 0;
                    info!("Circuit breaker closed after successful trial attempts");
                }
            }
            BreakerState::Closed => {
                self.failure_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed delivery
    pub fn record_failure(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(Instant::now());

        match self.state {
            BreakerState::Closed if self.failure_count >= self.config.failure_threshold => {
                self.state = BreakerState::Open;
                warn!(
                    failure_count = self.failure_count,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker opened"
                );
            }
            BreakerState::HalfOpen => {
                self.state = BreakerState::Open;
                self.consecutive_successes = 0;
                warn!(
                    failure_count = self.failure_count,
                    "Circuit breaker re-opened after failed trial attempt"
                );
            }
            _ => {}
        }
    }

    /// Current state, without the lazy half-open check
    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Point-in-time view for status reporting
    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            consecutive_successes: self.consecutive_successes,
        }
    }
}
