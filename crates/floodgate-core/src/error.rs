//! Error types for floodgate operations

use thiserror::Error;

/// Result type for floodgate operations
pub type FloodgateResult<T> = Result<T, FloodgateError>;

/// Errors that can occur inside the delivery layer
///
/// None of these reach a caller of
/// [`BackpressureManager::publish_with_backpressure`](crate::BackpressureManager::publish_with_backpressure);
/// the manager folds them into a [`PublishStatus`](crate::PublishStatus).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FloodgateError {
    /// The transport failed to publish or answer a query
    #[error("Transport error: {0}")]
    Transport(String),

    /// Channel queue is at capacity
    #[error("Queue full for channel '{channel}' (capacity: {capacity})")]
    QueueFull { channel: String, capacity: usize },

    /// Channel name rejected before any bookkeeping was created
    #[error("Invalid channel name: {0}")]
    InvalidChannel(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Manager has been shut down
    #[error("Backpressure manager is shut down")]
    ShutDown,

    /// Payload could not be serialized for the transport
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FloodgateError {
    /// Whether the error came from the transport (and should count against the breaker)
    pub fn is_transport(&self) -> bool {
        matches!(self, FloodgateError::Transport(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for FloodgateError {
    fn from(err: redis::RedisError) -> Self {
        FloodgateError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for FloodgateError {
    fn from(err: serde_json::Error) -> Self {
        FloodgateError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_message() {
        let err = FloodgateError::QueueFull {
            channel: "guide".to_string(),
            capacity: 2,
        };
        assert_eq!(
            err.to_string(),
            "Queue full for channel 'guide' (capacity: 2)"
        );
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_classification() {
        assert!(FloodgateError::Transport("connection reset".into()).is_transport());
        assert!(!FloodgateError::ShutDown.is_transport());
    }
}
