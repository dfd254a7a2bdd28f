//! Covenant CLI - Run agreement and ledger scenarios
//!
//! Each invocation deploys a fresh in-memory ledger and registry owned by
//! a generated deployer account, then drives them.
//!
//! # Quick Start
//!
//! ```bash
//! # Create a 13031 punishment agreement, fail participant one, show balances
//! covenant demo
//!
//! # Execute a scripted scenario
//! covenant run scenarios/overflow.json --fail-fast
//!
//! # Machine-readable output
//! covenant --output json demo --events
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use covenant_sdk::{AccountId, DeploymentReport, EventRecord};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod display;
mod scenario;

use crate::config::{CliConfig, LoggingConfig, OutputFormat};
use crate::scenario::{ScenarioReport, ScenarioRunner};

/// Covenant CLI - Two-party agreements settled in tokens
#[derive(Parser)]
#[command(name = "covenant")]
#[command(author = "Covenant Contributors")]
#[command(version)]
#[command(about = "Create, resolve, and settle two-party agreements against a token ledger", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML, JSON, or YAML)
    #[arg(long, global = true, env = "COVENANT_CONFIG")]
    config: Option<String>,

    /// Output format, overriding the configured one
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference settlement end to end
    Demo {
        /// Also print the merged event log
        #[arg(long)]
        events: bool,
    },

    /// Execute a JSON scenario file
    Run {
        /// Path to the scenario
        path: PathBuf,

        /// Stop at the first failing step
        #[arg(long)]
        fail_fast: bool,

        /// Skip wiring, regardless of configuration
        #[arg(long)]
        unwired: bool,

        /// Also print the merged event log
        #[arg(long)]
        events: bool,
    },
}

/// Everything printed in JSON mode
#[derive(Serialize)]
struct RunOutput {
    deployment: DeploymentReport,
    scenario: ScenarioReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<EventRecord>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    let format = cli.output.unwrap_or(config.output.format);

    let (scenario, fail_fast, wire, events) = match cli.command {
        Commands::Demo { events } => (scenario::reference_scenario(), false, true, events),
        Commands::Run {
            path,
            fail_fast,
            unwired,
            events,
        } => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
            let scenario = scenario::parse(&raw)
                .map_err(|e| anyhow::anyhow!("invalid scenario {}: {e}", path.display()))?;
            (scenario, fail_fast, config.deployment.wire && !unwired, events)
        }
    };

    let deployer = AccountId::new();
    let deployment = scenario::deploy(deployer, wire).await?;
    info!(%deployer, wired = wire, steps = scenario.steps.len(), "Running scenario");

    let mut runner = ScenarioRunner::new(deployment);
    let report = runner.run(&scenario, fail_fast).await;
    let deployment = runner.deployment();

    let output = RunOutput {
        deployment: deployment.report().await,
        events: if events {
            Some(deployment.event_log().await)
        } else {
            None
        },
        scenario: report,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            display::deployment(&output.deployment);
            display::scenario_report(&output.scenario);
            if let Some(records) = &output.events {
                display::section("Events");
                for record in records {
                    display::info(&format!(
                        "#{} {} {}",
                        record.sequence,
                        record.source,
                        serde_json::to_string(&record.event)?
                    ));
                }
            }
        }
    }

    if fail_fast && output.scenario.failures() > 0 {
        anyhow::bail!("scenario stopped at step {}", output.scenario.steps.len());
    }

    Ok(())
}

/// Logs go to stderr so JSON output on stdout stays parseable.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            subscriber
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }

    Ok(())
}
