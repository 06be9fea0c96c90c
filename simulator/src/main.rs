//! IntentRoute Simulator
//!
//! Runs the router against simulated venues and an in-memory wallet, and
//! prints the result record of every scenario as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use intentroute_common::StaticTokenTable;
use intentroute_executor::RouterConfig;
use intentroute_wallet::WalletConfig;

mod metrics;
mod scenario;
mod venue;

use metrics::SimulationMetrics;
use scenario::{Scenario, Simulation};

/// IntentRoute Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Run IntentRoute against simulated venues")]
struct Args {
    /// Scenario to run (all scenarios when omitted)
    #[arg(short, long)]
    scenario: Option<String>,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated confirmation delay in milliseconds
    #[arg(long)]
    confirmation_ms: Option<u64>,

    /// Token table JSON file (built-in table when omitted)
    #[arg(long)]
    tokens: Option<std::path::PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let router_config = RouterConfig::from_env();
    router_config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    init_logging(router_config.log_level.as_deref(), args.json);

    if args.list {
        for scenario in Scenario::ALL {
            println!("{:<16} {}", scenario.name(), scenario.description());
        }
        return Ok(());
    }

    let mut wallet_config = WalletConfig::from_env();
    if let Some(ms) = args.confirmation_ms {
        wallet_config.confirmation_delay = Duration::from_millis(ms);
    }
    wallet_config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid wallet configuration: {}", e))?;

    let mut simulation = Simulation::new(args.seed, router_config, wallet_config);
    if let Some(path) = &args.tokens {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading token table {}", path.display()))?;
        simulation = simulation.with_tokens(Arc::new(StaticTokenTable::from_json(&raw)?));
    }

    let scenarios = match &args.scenario {
        Some(name) => vec![name.parse::<Scenario>()?],
        None => Scenario::ALL.to_vec(),
    };

    info!(scenarios = scenarios.len(), seed = ?args.seed, "Starting IntentRoute simulator");

    let mut metrics = SimulationMetrics::new();
    for scenario in scenarios {
        let report = simulation.run(scenario).await?;
        metrics.record(report.passed, report.latency_ms);
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let summary = metrics.summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!(
        passed = summary.passed_runs,
        failed = summary.failed_runs,
        average_latency_ms = summary.average_latency_ms,
        "Simulation complete"
    );

    if summary.failed_runs > 0 {
        bail!("{} scenario(s) did not behave as expected", summary.failed_runs);
    }
    Ok(())
}

fn init_logging(configured: Option<&str>, json: bool) {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| "info".into());
    let registry = tracing_subscriber::registry().with(EnvFilter::new(directive));

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
