//! infratwin - governed hybrid quantum/classical decision loop demo.
//!
//! Drives a fleet of simulated digital twins through the routing loop and
//! prints a run summary, optionally exporting the audit history.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod export;
mod run;
mod telemetry;

/// infratwin - hybrid decision loop demo runner
#[derive(Parser, Debug)]
#[command(name = "infratwin")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Number of orchestrated steps
    #[arg(long, default_value_t = 250)]
    steps: u64,

    /// Number of simulated twins
    #[arg(long, default_value_t = 3)]
    twins: usize,

    /// Routing policy
    #[arg(long, default_value = "rule", value_parser = ["rule", "bandit"])]
    policy: String,

    /// Seed for telemetry, the gateway, and the bandit
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Feature window length in samples
    #[arg(long, default_value_t = 12)]
    window: usize,

    /// Directory to export history.jsonl and history.csv into
    #[arg(long)]
    export: Option<PathBuf>,

    /// Use the system clock instead of simulated time (slow: modeled queue
    /// waits become real waits)
    #[arg(long)]
    real_time: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    run::run(&run::RunArgs {
        steps: cli.steps,
        twins: cli.twins,
        policy: cli.policy,
        seed: cli.seed,
        window: cli.window,
        export: cli.export,
        real_time: cli.real_time,
    })
}
