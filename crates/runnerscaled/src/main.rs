//! runnerscaled — the runner fleet autoscaler daemon.
//!
//! Reads its settings from the environment (optionally seeded from a
//! `.env` file), then either runs the controller once or keeps running it
//! on a fixed interval until Ctrl-C.
//!
//! The fleet is described by a TOML inventory and served by the in-memory
//! provider, so every resize is applied to that inventory and logged. Load
//! sampling scrapes the real runner endpoints listed in it.
//!
//! # Usage
//!
//! ```text
//! runnerscaled --inventory fleet.toml once
//! runnerscaled --inventory fleet.toml --log-json run --interval-secs 60
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use runnerscale_autoscale::Controller;
use runnerscale_fleet::{ControllerConfig, InMemoryFleet, Inventory};
use runnerscale_metrics::{HttpLoadSampler, SystemClock, TracingSink};

#[derive(Parser)]
#[command(name = "runnerscaled", about = "Right-sizes a runner fleet from its job load")]
struct Cli {
    /// TOML inventory describing the fleet.
    #[arg(long)]
    inventory: PathBuf,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single invocation and exit.
    Once,
    /// Run invocations on a fixed interval until Ctrl-C.
    Run {
        /// Seconds between invocations.
        #[arg(long, default_value = "60")]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ControllerConfig::from_env().context("invalid controller configuration")?;
    let fleet = Arc::new(load_inventory(&cli.inventory)?);

    let controller = Controller::new(
        &config,
        fleet.clone(),
        fleet,
        Arc::new(HttpLoadSampler::from_config(&config)),
        Arc::new(TracingSink),
        Arc::new(SystemClock),
    );

    match cli.command {
        Command::Once => {
            let report = controller.run_once().await?;
            info!(
                fleet = %controller.fleet_name(),
                desired = report.decision.desired_capacity,
                action = ?report.action,
                "done"
            );
            Ok(())
        }
        Command::Run { interval_secs } => {
            run_scheduled(&controller, Duration::from_secs(interval_secs.max(1))).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(
            "info,runnerscale_fleet=debug,runnerscale_metrics=debug,runnerscale_autoscale=debug,runnerscaled=debug",
        ));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_inventory(path: &Path) -> anyhow::Result<InMemoryFleet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read inventory {}", path.display()))?;
    let inventory = Inventory::from_toml(&content)
        .with_context(|| format!("failed to parse inventory {}", path.display()))?;
    info!(path = ?path, fleet = %inventory.group.name, "inventory loaded");
    Ok(InMemoryFleet::new(inventory))
}

async fn run_scheduled(controller: &Controller, interval: Duration) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Dropping the sender would stop the controller.
                warn!(error = %e, "failed to listen for Ctrl-C");
                let _held = shutdown_tx;
                std::future::pending::<()>().await;
            }
        }
    });

    controller.run(interval, shutdown_rx).await;
    info!("runnerscaled stopped");
    Ok(())
}
