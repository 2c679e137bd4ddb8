//! Boson CLI entry point.

use std::path::PathBuf;

use boson_node_core::args::{LogArgs, MetricsArgs, ReservationArgs, UsageArgs};
use boson_node_core::constants::DEFAULT_SHUTDOWN_TIMEOUT;
use boson_node_core::metrics::install_prometheus_exporter;
use boson_node_core::{Boson, BosonConfig, SeedManifest, logging, version};
use boson_tasks::TaskManager;
use clap::{Args, Parser, Subcommand};
use eyre::{Result, WrapErr};
use tracing::{error, info, warn};

/// Boson - distributed quota and reservation engine
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    logs: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a node: seed the catalog and sweep expired reservations until interrupted.
    Run(RunArgs),
    /// Print the effective configuration as TOML.
    Config(ConfigArgs),
    /// Validate a seed manifest against an empty catalog.
    CheckSeed(CheckSeedArgs),
}

/// Configuration file plus command line overrides.
#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to a TOML configuration file.
    #[arg(long, value_name = "PATH", env = "BOSON_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    usage: UsageArgs,

    #[command(flatten)]
    reservations: ReservationArgs,

    #[command(flatten)]
    metrics: MetricsArgs,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<BosonConfig> {
        let mut config = BosonConfig::load(self.config.as_deref())?;
        config.apply_args(&self.usage, &self.reservations, &self.metrics)?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    node: ConfigArgs,

    /// Seed manifest of services, resources and quotas to register on start-up.
    #[arg(long, value_name = "PATH", env = "BOSON_SEED")]
    seed: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckSeedArgs {
    /// Seed manifest to validate.
    #[arg(value_name = "PATH")]
    seed: PathBuf,
}

/// Parse the command line and dispatch.
pub(crate) async fn run() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logging(&cli.logs)?;

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Config(args) => {
            print!("{}", args.resolve()?.to_toml()?);
            Ok(())
        }
        Commands::CheckSeed(args) => {
            let manifest = SeedManifest::load(&args.seed)?;
            let summary = Boson::in_memory(&BosonConfig::default()).seed(&manifest)?;
            println!(
                "{}: {} services, {} resources, {} quotas",
                args.seed.display(),
                summary.services,
                summary.resources,
                summary.quotas
            );
            Ok(())
        }
    }
}

async fn run_node(args: RunArgs) -> Result<()> {
    info!("Starting {}", version::NAME_VERSION);

    let config = args.node.resolve()?;
    if config.metrics.enabled {
        install_prometheus_exporter(config.metrics_socket_addr())?;
    }

    let boson = Boson::in_memory(&config);
    if let Some(path) = &args.seed {
        boson.seed(&SeedManifest::load(path)?)?;
    }

    let mut tasks = TaskManager::current();
    let sweeper = boson.sweeper();
    tasks
        .executor()
        .spawn_critical_with_graceful_shutdown("expiry sweeper", |shutdown| sweeper.run(shutdown));

    info!(
        staleness_threshold = ?config.usage.staleness_threshold,
        ttl = ?config.reservations.ttl,
        sweep_interval = ?config.reservations.sweep_interval,
        "node running"
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.wrap_err("failed to listen for ctrl-c")?;
            info!("shutdown requested");
        }
        panicked = tasks.wait_for_panic() => {
            error!(task = panicked.task_name, error = %panicked.error, "critical task failed, shutting down");
        }
    }

    if !tasks.graceful_shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await {
        warn!("background tasks did not stop in time");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "boson",
            "-vv",
            "run",
            "--reservations.ttl",
            "2h",
            "--usage.staleness-threshold",
            "90s",
            "--usage.refresh-after",
            "50",
            "--metrics",
        ])
        .unwrap();
        assert_eq!(cli.logs.verbosity, 2);

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let config = args.node.resolve().unwrap();
        assert_eq!(config.reservations.ttl.as_secs(), 7_200);
        assert_eq!(config.usage.staleness_threshold.as_secs(), 90);
        assert_eq!(config.usage.refresh_after, Some(50));
        assert!(config.metrics.enabled);
    }
}
