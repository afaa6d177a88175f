use anyhow::{Context, Result};
use chefbot::driver::{pump_lines, JsonLinesRuntime};
use chefbot::kernel::sequencer::Phase;
use chefbot::plan::types::BehaviourTree;
use chefbot::{PilotConfig, Reactor};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Drives one player through an authored behaviour tree.
/// World snapshots and task results arrive on stdin, assignments leave on stdout.
#[derive(Debug, Parser)]
#[command(name = "chefbot", version)]
struct Args {
    /// Path to behaviour tree JSON file
    #[arg(long)]
    bt_file: PathBuf,

    #[arg(long, default_value = "0")]
    player_id: String,

    /// Milliseconds between scheduling opportunities
    #[arg(long, default_value_t = 100)]
    step_time: u64,

    /// Keep running after the last step succeeds
    #[arg(long)]
    keep_alive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the wire, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let plan = BehaviourTree::load(&args.bt_file)
        .with_context(|| format!("loading behaviour tree from {}", args.bt_file.display()))?;
    tracing::info!("Loaded {} steps from {}", plan.len(), args.bt_file.display());

    let config = PilotConfig {
        player_id: args.player_id,
        step_time_ms: args.step_time,
        exit_on_finish: !args.keep_alive,
    };

    let (tx, rx) = mpsc::channel(100);
    let runtime = JsonLinesRuntime::new(&config.player_id, std::io::stdout());
    let mut reactor = Reactor::new(rx, plan, runtime, config);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    tokio::spawn(async move {
        if let Err(e) = pump_lines(BufReader::new(tokio::io::stdin()), tx).await {
            tracing::warn!("Stopped reading stdin: {}", e);
        }
    });

    let phase = reactor.run(cancel).await;
    let summary = reactor.telemetry.snapshot();
    tracing::info!(
        "Stopped at step {}/{} ({:?}): {} issued, {} succeeded, {} failed, {} unresolved",
        reactor.sequencer.cursor(),
        reactor.sequencer.plan().len(),
        phase,
        summary.issued,
        summary.succeeded,
        summary.failed,
        summary.resolution_failures
    );

    if phase != Phase::Exhausted {
        tracing::warn!("Plan not finished");
    }
    Ok(())
}
