//! `floodgate publish`: one message through Redis with backpressure

use crate::error::CliError;
use clap::Args;
use floodgate::{
    BackpressureConfig, BackpressureManager, PublishStatus, RedisChannel, RedisConfig,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Redis connection URL
    #[arg(long, default_value = "redis://localhost:6379")]
    pub url: String,
    /// Channel to publish to
    #[arg(long)]
    pub channel: String,
    /// JSON payload
    #[arg(long)]
    pub message: String,
    /// Prefix prepended to the Redis channel name
    #[arg(long, default_value = "")]
    pub key_prefix: String,
    /// Queue capacity if the message has to wait
    #[arg(long)]
    pub max_queue_size: Option<usize>,
    /// How long a queued message may wait for delivery before exiting
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub wait: Duration,
}

pub async fn run_publish(args: PublishArgs, config: BackpressureConfig) -> Result<(), CliError> {
    let payload: Value = serde_json::from_str(&args.message)?;

    let transport = RedisChannel::with_config(
        RedisConfig::new(args.url.clone()).with_key_prefix(args.key_prefix.clone()),
    )
    .await?;
    let manager = BackpressureManager::new(Arc::new(transport), config);

    let outcome = manager
        .publish_with_backpressure(&args.channel, payload, args.max_queue_size)
        .await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.status == PublishStatus::Queued {
        info!(channel = %args.channel, wait = ?args.wait, "Message queued, waiting for drain");
        let deadline = tokio::time::Instant::now() + args.wait;
        while tokio::time::Instant::now() < deadline {
            let status = manager.queue_status(Some(&args.channel)).await;
            if status.total_queued() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        let status = manager.queue_status(Some(&args.channel)).await;
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    manager.shutdown().await;
    Ok(())
}
