//! # Floodgate Core
//!
//! Backpressure-aware delivery between message producers and a pub/sub
//! transport.
//!
//! Every channel gets its own circuit breaker, a bounded queue and a drain
//! worker. [`BackpressureManager::publish_with_backpressure`] publishes right
//! away when the channel is healthy and has subscribers, queues otherwise, and
//! rejects once the queue is full. The drain worker keeps retrying queued
//! messages behind the same breaker.
//!
//! ## Features
//!
//! - **Circuit breaking**: closed / open / half-open per channel
//! - **Bounded queues**: explicit rejection instead of unbounded growth
//! - **Supervised workers**: one drain task per channel, cancelled on shutdown
//! - **Transports**: in-memory broadcast, Redis (feature `redis`)
//!
//! ## Example
//!
//! ```rust
//! use floodgate_core::{BackpressureConfig, BackpressureManager, InMemoryPubSub, PublishStatus};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let manager = BackpressureManager::new(
//!     Arc::new(InMemoryPubSub::new()),
//!     BackpressureConfig::default(),
//! );
//!
//! // Nobody listens yet, so the message waits in the channel queue
//! let outcome = manager
//!     .publish_with_backpressure("content.guide", json!({"type": "update"}), Some(100))
//!     .await;
//! assert_eq!(outcome.status, PublishStatus::Queued);
//!
//! let status = manager.queue_status(Some("content.guide")).await;
//! assert_eq!(status.get("content.guide").unwrap().capacity, 100);
//!
//! manager.shutdown().await;
//! # });
//! ```

pub mod breaker;
pub mod channel;
pub mod config;
pub mod error;
pub mod manager;
pub mod message;
pub mod queue;
pub mod state;
pub mod status;
pub mod worker;

#[cfg(feature = "redis")]
pub mod redis;

pub use breaker::CircuitBreaker;
pub use channel::{InMemoryPubSub, PubSubChannel};
pub use config::{BackpressureConfig, BackpressureConfigBuilder, BreakerConfig, DrainConfig};
pub use error::{FloodgateError, FloodgateResult};
pub use manager::{BackpressureManager, PublishOutcome, PublishStatus};
pub use message::PendingMessage;
pub use queue::ChannelQueue;
pub use state::{ChannelCounters, ChannelState};
pub use status::{BreakerSnapshot, BreakerState, ChannelStatus, QueueStatus};
pub use worker::DrainWorker;

#[cfg(feature = "redis")]
pub use self::redis::{RedisChannel, RedisConfig};
