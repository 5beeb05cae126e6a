//! # Configuration
//!
//! Defaults reproduce the delivery layer's fixed timings: a breaker opens
//! after 5 failures and probes again after 30 seconds, two half-open
//! successes close it, queues hold 1000 messages, and drain workers wait
//! 1 second for work, back off 5 seconds while the breaker is open and
//! 1 second after a failed delivery.
//!
//! ## Environment Variables
//!
//! - `FLOODGATE_QUEUE_CAPACITY` - Default per-channel queue capacity (default: 1000)
//! - `FLOODGATE_BREAKER_FAILURE_THRESHOLD` - Failures before the breaker opens (default: 5)
//! - `FLOODGATE_BREAKER_RECOVERY_TIMEOUT` - Open duration before a half-open probe (default: 30s)
//! - `FLOODGATE_BREAKER_SUCCESS_THRESHOLD` - Half-open successes needed to close (default: 2)
//! - `FLOODGATE_DRAIN_POLL_INTERVAL` - Queue wait per drain iteration (default: 1s)
//! - `FLOODGATE_DRAIN_OPEN_BACKOFF` - Drain pause while the breaker is open (default: 5s)
//! - `FLOODGATE_DRAIN_FAILURE_BACKOFF` - Drain pause after a failed delivery (default: 1s)
//! - `FLOODGATE_SHUTDOWN_GRACE` - How long shutdown waits for drain workers (default: 2s)
//!
//! Durations use `humantime` syntax (`500ms`, `30s`, `1m`).

use crate::error::{FloodgateError, FloodgateResult};
use serde::{Deserialize, Serialize};
use std::{env, path::Path, time::Duration};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_OPEN_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Circuit breaker thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures (while closed) that open the breaker
    pub failure_threshold: u32,
    /// Time the breaker stays open before allowing a trial attempt
    #[serde(with = "duration_str")]
    pub recovery_timeout: Duration,
    /// Consecutive half-open successes that close the breaker
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

impl BreakerConfig {
    /// Create a breaker config with custom threshold and recovery timeout
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            ..Default::default()
        }
    }
}

/// Drain worker timings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    /// Maximum wait for the next queued message
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    /// Pause after finding the breaker open
    #[serde(with = "duration_str")]
    pub open_backoff: Duration,
    /// Pause after a failed delivery attempt
    #[serde(with = "duration_str")]
    pub failure_backoff: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            open_backoff: DEFAULT_OPEN_BACKOFF,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
        }
    }
}

/// Top-level configuration for [`BackpressureManager`](crate::BackpressureManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackpressureConfig {
    /// Queue capacity for channels created without an explicit size
    pub default_queue_capacity: usize,
    /// Upper bound on how long shutdown waits for the drain workers
    #[serde(with = "duration_str")]
    pub shutdown_grace: Duration,
    pub breaker: BreakerConfig,
    pub drain: DrainConfig,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            default_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            breaker: BreakerConfig::default(),
            drain: DrainConfig::default(),
        }
    }
}

impl BackpressureConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> FloodgateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FloodgateError::InvalidConfig(format!("Failed to read config file: {}", e))
        })?;

        Self::load_from_toml(&content)
    }

    /// Load configuration from a TOML string; missing keys keep their defaults
    pub fn load_from_toml(toml_content: &str) -> FloodgateResult<Self> {
        let config: Self = toml::from_str(toml_content).map_err(|e| {
            FloodgateError::InvalidConfig(format!("Failed to parse TOML config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value is usable
    pub fn validate(&self) -> FloodgateResult<()> {
        if self.default_queue_capacity == 0 {
            return Err(FloodgateError::InvalidConfig(
                "default_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(FloodgateError::InvalidConfig(
                "breaker.failure_threshold must be greater than 0".to_string(),
            ));
        }
        if self.breaker.success_threshold == 0 {
            return Err(FloodgateError::InvalidConfig(
                "breaker.success_threshold must be greater than 0".to_string(),
            ));
        }

        let durations = [
            ("breaker.recovery_timeout", self.breaker.recovery_timeout),
            ("drain.poll_interval", self.drain.poll_interval),
            ("drain.open_backoff", self.drain.open_backoff),
            ("drain.failure_backoff", self.drain.failure_backoff),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(FloodgateError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }
}

/// Builder for [`BackpressureConfig`] with environment variable support
#[derive(Debug, Clone, Default)]
pub struct BackpressureConfigBuilder {
    config: BackpressureConfig,
}

impl BackpressureConfigBuilder {
    /// Create a new builder with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `FLOODGATE_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns `FloodgateError::InvalidConfig` if a variable is present but
    /// cannot be parsed.
    pub fn from_env() -> FloodgateResult<Self> {
        let mut builder = Self::default();

        if let Some(capacity) = get_env_usize("FLOODGATE_QUEUE_CAPACITY")? {
            builder = builder.default_queue_capacity(capacity);
        }
        if let Some(threshold) = get_env_u32("FLOODGATE_BREAKER_FAILURE_THRESHOLD")? {
            builder = builder.failure_threshold(threshold);
        }
        if let Some(timeout) = get_env_duration("FLOODGATE_BREAKER_RECOVERY_TIMEOUT")? {
            builder = builder.recovery_timeout(timeout);
        }
        if let Some(threshold) = get_env_u32("FLOODGATE_BREAKER_SUCCESS_THRESHOLD")? {
            builder = builder.success_threshold(threshold);
        }
        if let Some(interval) = get_env_duration("FLOODGATE_DRAIN_POLL_INTERVAL")? {
            builder.config.drain.poll_interval = interval;
        }
        if let Some(backoff) = get_env_duration("FLOODGATE_DRAIN_OPEN_BACKOFF")? {
            builder.config.drain.open_backoff = backoff;
        }
        if let Some(backoff) = get_env_duration("FLOODGATE_DRAIN_FAILURE_BACKOFF")? {
            builder.config.drain.failure_backoff = backoff;
        }
        if let Some(grace) = get_env_duration("FLOODGATE_SHUTDOWN_GRACE")? {
            builder = builder.shutdown_grace(grace);
        }

        Ok(builder)
    }

    pub fn default_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.default_queue_capacity = capacity;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.breaker.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.breaker.recovery_timeout = timeout;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.breaker.success_threshold = threshold;
        self
    }

    pub fn drain(mut self, drain: DrainConfig) -> Self {
        self.config.drain = drain;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Validate and produce the configuration
    pub fn build(self) -> FloodgateResult<BackpressureConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl From<BackpressureConfig> for BackpressureConfigBuilder {
    fn from(config: BackpressureConfig) -> Self {
        Self { config }
    }
}

fn invalid_env(key: &str, message: String) -> FloodgateError {
    FloodgateError::InvalidConfig(format!("Invalid environment variable '{key}': {message}"))
}

fn get_env_u32(key: &str) -> FloodgateResult<Option<u32>> {
    match env::var(key) {
        Ok(val) => val
            .parse::<u32>()
            .map(Some)
            .map_err(|e| invalid_env(key, format!("invalid u32 value '{val}': {e}"))),
        Err(_) => Ok(None),
    }
}

fn get_env_usize(key: &str) -> FloodgateResult<Option<usize>> {
    match env::var(key) {
        Ok(val) => val
            .parse::<usize>()
            .map(Some)
            .map_err(|e| invalid_env(key, format!("invalid usize value '{val}': {e}"))),
        Err(_) => Ok(None),
    }
}

fn get_env_duration(key: &str) -> FloodgateResult<Option<Duration>> {
    match env::var(key) {
        Ok(val) => humantime::parse_duration(&val)
            .map(Some)
            .map_err(|e| invalid_env(key, format!("invalid duration '{val}': {e}"))),
        Err(_) => Ok(None),
    }
}

/// Serde helper: durations as humantime strings (`"30s"`, `"250ms"`)
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_delivery_constants() {
        let config = BackpressureConfig::default();
        assert_eq!(config.default_queue_capacity, 1000);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.breaker.success_threshold, 2);
        assert_eq!(config.drain.poll_interval, Duration::from_secs(1));
        assert_eq!(config.drain.open_backoff, Duration::from_secs(5));
        assert_eq!(config.drain.failure_backoff, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let result = BackpressureConfigBuilder::new()
            .default_queue_capacity(0)
            .build();
        assert!(matches!(result, Err(FloodgateError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_overrides() {
        let config = BackpressureConfigBuilder::new()
            .failure_threshold(2)
            .recovery_timeout(Duration::from_secs(1))
            .default_queue_capacity(10)
            .build()
            .unwrap();

        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.breaker.recovery_timeout, Duration::from_secs(1));
        assert_eq!(config.breaker.success_threshold, 2);
        assert_eq!(config.default_queue_capacity, 10);
    }

    #[test]
    fn test_load_from_toml_partial() {
        let toml = r#"
            default_queue_capacity = 50

            [breaker]
            failure_threshold = 3
            recovery_timeout = "10s"

            [drain]
            open_backoff = "250ms"
        "#;

        let config = BackpressureConfig::load_from_toml(toml).unwrap();
        assert_eq!(config.default_queue_capacity, 50);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.recovery_timeout, Duration::from_secs(10));
        assert_eq!(config.breaker.success_threshold, 2);
        assert_eq!(config.drain.open_backoff, Duration::from_millis(250));
        assert_eq!(config.drain.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_toml_rejects_bad_duration() {
        let toml = r#"
            [breaker]
            recovery_timeout = "soon"
        "#;
        assert!(BackpressureConfig::load_from_toml(toml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floodgate.toml");
        std::fs::write(&path, "default_queue_capacity = 7\n").unwrap();

        let config = BackpressureConfig::load_from_file(&path).unwrap();
        assert_eq!(config.default_queue_capacity, 7);
    }

    #[test]
    fn test_toml_round_trip_uses_humantime() {
        let rendered = toml::to_string(&BackpressureConfig::default()).unwrap();
        assert!(rendered.contains("recovery_timeout = \"30s\""));
    }
}
