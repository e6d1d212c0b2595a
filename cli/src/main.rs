use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trade_negotiation_core_rs::{Orchestrator, OrchestratorConfig};

#[derive(Parser, Debug)]
#[command(
    name = "trade-negotiation-cli",
    about = "Run a trade negotiation scenario and print a JSON summary"
)]
struct Cli {
    /// Path to the scenario JSON file
    #[arg(short, long, default_value = "cli/scenarios/three_suppliers.json")]
    scenario: String,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Include the full event log in the output
    #[arg(long)]
    events: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(scenario = %cli.scenario, "loading scenario");

    let scenario = std::fs::read_to_string(&cli.scenario)
        .with_context(|| format!("Failed to read scenario: {}", cli.scenario))?;
    let config: OrchestratorConfig =
        serde_json::from_str(&scenario).with_context(|| "Failed to parse scenario")?;

    let mut orchestrator =
        Orchestrator::new(config).with_context(|| "Invalid scenario configuration")?;
    let summary = orchestrator.run().with_context(|| "Simulation aborted")?;
    info!(
        final_tick = summary.final_tick,
        orders = summary.orders_emitted,
        concluded = summary.transactions_concluded,
        "scenario complete"
    );

    let output = if cli.events {
        serde_json::json!({
            "summary": summary,
            "events": orchestrator.event_log().events(),
        })
    } else {
        serde_json::to_value(&summary)?
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(())
}
