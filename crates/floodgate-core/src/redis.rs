//! Redis pub/sub transport

use crate::channel::PubSubChannel;
use crate::error::{FloodgateError, FloodgateResult};
use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Maximum number of connections in the pool
    pub pool_size: usize,
    /// Prepended to every channel name, e.g. "app:"
    pub key_prefix: String,
    /// Upper bound for a single PUBLISH or PUBSUB call
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: String::new(),
            command_timeout: Duration::from_secs(3),
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// [`PubSubChannel`] over a pooled Redis connection
pub struct RedisChannel {
    pool: deadpool_redis::Pool,
    config: RedisConfig,
}

impl std::fmt::Debug for RedisChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisChannel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisChannel {
    pub async fn new(url: impl Into<String>) -> FloodgateResult<Self> {
        Self::with_config(RedisConfig::new(url)).await
    }

    /// Build the pool and check the server answers PING
    pub async fn with_config(config: RedisConfig) -> FloodgateResult<Self> {
        if config.pool_size == 0 {
            return Err(FloodgateError::InvalidConfig(
                "pool_size must be greater than 0".to_string(),
            ));
        }

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        redis_config.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size));

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| FloodgateError::InvalidConfig(e.to_string()))?;

        let channel = Self { pool, config };
        channel
            .with_timeout(async {
                let mut conn = channel.connection().await?;
                redis::cmd("PING")
                    .query_async::<String>(&mut *conn)
                    .await
                    .map_err(|e| FloodgateError::Transport(format!("PING failed: {e}")))
            })
            .await?;

        debug!(url = %channel.config.url, "Redis transport connected");
        Ok(channel)
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    async fn connection(&self) -> FloodgateResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| FloodgateError::Transport(e.to_string()))
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = FloodgateResult<T>>,
    ) -> FloodgateResult<T> {
        tokio::time::timeout(self.config.command_timeout, fut)
            .await
            .map_err(|_| {
                FloodgateError::Transport(format!(
                    "Redis command timed out after {:?}",
                    self.config.command_timeout
                ))
            })?
    }

    fn channel_key(&self, channel: &str) -> String {
        format!("{}{}", self.config.key_prefix, channel)
    }
}

#[async_trait]
impl PubSubChannel for RedisChannel {
    async fn publish(&self, channel: &str, payload: &Value) -> FloodgateResult<()> {
        let body = serde_json::to_string(payload)?;
        let key = self.channel_key(channel);

        let receivers: usize = self
            .with_timeout(async {
                let mut conn = self.connection().await?;
                Ok(conn.publish(&key, body).await?)
            })
            .await?;

        debug!(channel = %key, receivers, "Published to Redis");
        Ok(())
    }

    async fn subscriber_count(&self, channel: &str) -> FloodgateResult<usize> {
        let key = self.channel_key(channel);

        let counts: Vec<(String, usize)> = self
            .with_timeout(async {
                let mut conn = self.connection().await?;
                Ok(redis::cmd("PUBSUB")
                    .arg("NUMSUB")
                    .arg(&key)
                    .query_async(&mut *conn)
                    .await?)
            })
            .await?;

        Ok(counts
            .into_iter()
            .find(|(name, _)| *name == key)
            .map(|(_, count)| count)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config() {
        let config = RedisConfig::new("redis://cache:6379")
            .with_pool_size(20)
            .with_key_prefix("app:")
            .with_command_timeout(Duration::from_secs(1));

        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.pool_size, 20);
        assert_eq!(config.key_prefix, "app:");
        assert_eq!(config.command_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_pool_size_rejected() {
        let config = RedisConfig::default().with_pool_size(0);
        let err = RedisChannel::with_config(config).await.unwrap_err();
        assert!(matches!(err, FloodgateError::InvalidConfig(_)));
    }
}
