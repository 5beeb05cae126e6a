//! `floodgate simulate`: exercise the manager against a scripted transport

use crate::error::CliError;
use clap::Args;
use floodgate::observability::{DEFAULT_MAX_CHANNEL_LABELS, QueueMetrics};
use floodgate::{BackpressureConfig, BackpressureManager, QueueStatus};
use floodgate_testing::MockChannel;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of channels to publish to
    #[arg(long, default_value_t = 1)]
    pub channels: usize,
    /// Messages published to each channel
    #[arg(long, default_value_t = 10)]
    pub messages: usize,
    /// Subscriber count reported by the simulated transport
    #[arg(long, default_value_t = 1)]
    pub subscribers: usize,
    /// Number of initial publish calls that fail
    #[arg(long, default_value_t = 0)]
    pub fail_first: usize,
    /// Queue capacity for each channel
    #[arg(long)]
    pub max_queue_size: Option<usize>,
    /// How long drain workers run before the report (e.g. "3s")
    #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub drain_for: Duration,
    /// Publish latency of the simulated transport
    #[arg(long, value_parser = humantime::parse_duration)]
    pub latency: Option<Duration>,
    /// Append Prometheus text output after the JSON report
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Debug, Serialize)]
pub struct TransportReport {
    pub publish_calls: usize,
    pub delivered: usize,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// Publish outcomes by status
    pub outcomes: BTreeMap<String, usize>,
    pub transport: TransportReport,
    pub status: QueueStatus,
}

pub async fn simulate(
    args: &SimulateArgs,
    config: BackpressureConfig,
) -> Result<SimulationReport, CliError> {
    if args.channels == 0 {
        return Err(CliError::InvalidArgument(
            "--channels must be at least 1".to_string(),
        ));
    }

    let mut transport = MockChannel::new()
        .with_default_subscribers(args.subscribers)
        .with_failures(args.fail_first);
    if let Some(latency) = args.latency {
        transport = transport.with_publish_delay(latency);
    }

    let manager = BackpressureManager::new(Arc::new(transport.clone()), config);
    let mut outcomes: BTreeMap<String, usize> = BTreeMap::new();

    for seq in 0..args.messages {
        for channel in 0..args.channels {
            let name = format!("sim.{channel}");
            let outcome = manager
                .publish_with_backpressure(&name, json!({ "seq": seq }), args.max_queue_size)
                .await;
            *outcomes.entry(outcome.status.to_string()).or_default() += 1;
        }
    }
    info!(
        channels = args.channels,
        messages = args.messages,
        drain_for = ?args.drain_for,
        "Published simulated load, letting drain workers run"
    );

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = tokio::time::sleep(args.drain_for) => {}
        _ = interrupted => info!("Interrupted, reporting early"),
    }

    let status = manager.queue_status(None).await;
    manager.shutdown().await;

    Ok(SimulationReport {
        outcomes,
        transport: TransportReport {
            publish_calls: transport.publish_count(),
            delivered: transport.delivered_count(),
        },
        status,
    })
}

pub async fn run_simulate(args: SimulateArgs, config: BackpressureConfig) -> Result<(), CliError> {
    let report = simulate(&args, config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.metrics {
        let metrics = QueueMetrics::new("floodgate", DEFAULT_MAX_CHANNEL_LABELS)?;
        metrics.observe(&report.status)?;
        print!("{}", metrics.render()?);
    }
    Ok(())
}
