use clap::{Parser, Subcommand};
use floodgate::observability::init_tracing;
use floodgate::{BackpressureConfig, BackpressureConfigBuilder, LogFormat, ObservabilityConfig};
use std::path::{Path, PathBuf};

mod error;
#[cfg(feature = "redis")]
mod publish;
mod simulate;

use error::CliError;
#[cfg(feature = "redis")]
use publish::{PublishArgs, run_publish};
use simulate::{SimulateArgs, run_simulate};

#[derive(Parser, Debug)]
#[command(name = "floodgate", version)]
#[command(about = "Floodgate CLI - backpressure-aware pub/sub delivery tools")]
struct Cli {
    /// Log output format (json, pretty, compact)
    #[arg(long, global = true, default_value = "compact", value_parser = parse_log_format)]
    log_format: LogFormat,
    /// TOML configuration file; FLOODGATE_* environment variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the manager against a simulated transport and print its status
    Simulate(SimulateArgs),
    /// Print the effective configuration as TOML
    Config,
    /// Publish one message through Redis
    #[cfg(feature = "redis")]
    Publish(PublishArgs),
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse().map_err(|e: floodgate::ObservabilityError| e.to_string())
}

fn load_config(path: Option<&Path>) -> Result<BackpressureConfig, CliError> {
    let config = match path {
        Some(path) => BackpressureConfig::load_from_file(path)?,
        None => BackpressureConfigBuilder::from_env()?.build()?,
    };
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate(args) => run_simulate(args, config).await,
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        #[cfg(feature = "redis")]
        Commands::Publish(args) => run_publish(args, config).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _ = init_tracing(&ObservabilityConfig {
        log_format: cli.log_format,
        ..Default::default()
    });

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::try_parse_from([
            "floodgate",
            "--log-format",
            "json",
            "simulate",
            "--channels",
            "3",
            "--drain-for",
            "500ms",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Simulate(_)));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["floodgate", "--log-format", "xml", "config"]).is_err());
    }
}
