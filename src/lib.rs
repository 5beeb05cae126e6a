//! # Floodgate
//!
//! Floodgate sits between message producers and a pub/sub transport and keeps
//! a struggling transport from taking producers down with it.
//!
//! ## Core Components
//!
//! - **[BackpressureManager]**: decides per publish attempt whether to publish, queue or reject
//! - **[CircuitBreaker]**: per-channel failure tracking (closed / open / half-open)
//! - **[ChannelQueue]**: bounded per-channel FIFO drained by a [DrainWorker]
//! - **[PubSubChannel]**: the transport seam; [InMemoryPubSub] ships in-process
//!
//! ## Quick Start
//!
//! ```rust
//! use floodgate::{BackpressureConfigBuilder, BackpressureManager, InMemoryPubSub, PublishStatus};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let pubsub = Arc::new(InMemoryPubSub::new());
//! let mut rx = pubsub.subscribe("orders");
//!
//! let config = BackpressureConfigBuilder::new()
//!     .default_queue_capacity(500)
//!     .failure_threshold(3)
//!     .build()
//!     .unwrap();
//! let manager = BackpressureManager::new(pubsub, config);
//!
//! let outcome = manager
//!     .publish_with_backpressure("orders", json!({"id": 42}), None)
//!     .await;
//! assert_eq!(outcome.status, PublishStatus::Published);
//! assert_eq!(rx.recv().await.unwrap()["id"], 42);
//!
//! manager.shutdown().await;
//! # });
//! ```

// ============================================================================
// Module aliases for namespaced access
// ============================================================================

pub use floodgate_core as core;
pub use floodgate_observability as observability;

// ============================================================================
// Core re-exports
// ============================================================================

pub use floodgate_core::{
    BackpressureConfig, BackpressureConfigBuilder, BackpressureManager, BreakerConfig,
    BreakerSnapshot, BreakerState, ChannelCounters, ChannelQueue, ChannelState, ChannelStatus,
    CircuitBreaker, DrainConfig, DrainWorker, FloodgateError, FloodgateResult, InMemoryPubSub,
    PendingMessage, PubSubChannel, PublishOutcome, PublishStatus, QueueStatus,
};

#[cfg(feature = "redis")]
pub use floodgate_core::{RedisChannel, RedisConfig};

pub use floodgate_observability::{LogFormat, ObservabilityConfig, ObservabilityError};
