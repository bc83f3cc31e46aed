//! E2E Scenario Runner
//!
//! Starts a declared topology of external deployment processes, then
//! polls the query frontier until it converges to the expected view.
//! Binary locations come from the environment (`PROMETHEUS_BIN`,
//! `MESHMON_BIN`, `NODE_EXPORTER_BIN`), loadable from a `.env` file.

use clap::Parser;
use std::time::Duration;

use tester::runtime::{CleanupManager, StartOptions};
use tester::scenarios;

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "E2E verification harness for the meshmon deployment")]
struct Args {
    /// Scenario to run
    #[arg(long, default_value = "static_flags")]
    scenario: String,

    /// Scenario deadline in seconds
    #[arg(long, default_value = "180")]
    timeout_secs: u64,

    /// Keep each run's working directory for debugging
    #[arg(long)]
    keep_workdir: bool,

    /// Skip the stale-process sweep before running
    #[arg(long)]
    no_cleanup: bool,

    /// Enable verbose tracing output
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    shared::logging::init_tracing(args.verbose);

    tracing::info!("🧪 Starting E2E verification harness");
    tracing::info!("Scenario: {}, Deadline: {}s", args.scenario, args.timeout_secs);

    if !args.no_cleanup {
        CleanupManager::new().cleanup_before_test(&args.scenario).await;
    }

    let opts = StartOptions {
        keep_workdir: args.keep_workdir,
        ..StartOptions::default()
    };
    let deadline = Duration::from_secs(args.timeout_secs);

    match scenarios::run_scenario(&args.scenario, deadline, opts).await {
        Ok(()) => {
            tracing::info!("🏁 Scenario '{}' completed successfully", args.scenario);
            Ok(())
        }
        Err(err) => {
            tracing::error!("❌ Scenario '{}' failed: {err}", args.scenario);
            Err(err.into())
        }
    }
}
