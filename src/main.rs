//! baseline-tuner - Baseline alert threshold tuning
//!
//! Loads the conditions of an account that produced deviation signals,
//! resolves one condition's configured threshold and prints the analytics
//! queries used to evaluate candidate thresholds.
//!
//! # Usage
//!
//! ```bash
//! # List conditions with deviation activity
//! NEW_RELIC_API_KEY=... baseline-tuner conditions --account 1234567
//!
//! # Select a condition and print the resulting view as JSON
//! baseline-tuner inspect --account 1234567 --condition 205 --threshold 4
//!
//! # Print derived queries without any network access
//! baseline-tuner queries --condition 205 --threshold 3
//!
//! # Replay recorded responses instead of calling NerdGraph
//! baseline-tuner --fixture responses.json inspect --account 1 --condition 205
//! ```
//!
//! # Environment Variables
//!
//! - `NEW_RELIC_API_KEY`: User API key for NerdGraph
//! - `TUNER_CONFIG`: Path to a TOML config file
//! - `RUST_LOG`: Logging level (default: info)
//! - `TUNER_LOG_JSON`: Emit JSON log lines when set to `true`

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use baseline_tuner::config::{self, TunerConfig};
use baseline_tuner::selection::{Phase, SelectionEvent};
use baseline_tuner::{
    filter_conditions, load_catalog, Account, AnalyticsGateway, Condition, ConditionId,
    DerivedQueries, FixtureGateway, NerdGraphGateway, Session, Threshold,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "baseline-tuner")]
#[command(about = "Baseline alert condition threshold tuning")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides TUNER_CONFIG and ./tuner_config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Answer queries from a JSON fixture file instead of NerdGraph
    #[arg(long, value_name = "PATH")]
    fixture: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "TUNER_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// List conditions that produced deviation signals in the last month
    Conditions {
        /// Account id
        #[arg(long)]
        account: u64,
        /// Only show conditions whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Select a condition and print the resulting view as JSON
    Inspect {
        /// Account id
        #[arg(long)]
        account: u64,
        /// Condition id to select
        #[arg(long)]
        condition: String,
        /// Candidate threshold to apply after selection
        #[arg(long)]
        threshold: Option<String>,
    },

    /// Print the derived display queries without network access
    Queries {
        /// Condition id (renders as 0 when omitted)
        #[arg(long)]
        condition: Option<String>,
        /// Threshold text, passed through verbatim
        #[arg(long, default_value = "0")]
        threshold: String,
        /// Signal query of the condition, for the Condition Signal chart
        #[arg(long)]
        signal_query: Option<String>,
    },
}

// ============================================================================
// Commands
// ============================================================================

fn build_gateway(args: &CliArgs) -> Result<Arc<dyn AnalyticsGateway>> {
    if let Some(path) = &args.fixture {
        info!(path = %path.display(), "Using fixture gateway");
        return Ok(Arc::new(FixtureGateway::load(path)?));
    }
    let gateway = NerdGraphGateway::from_config(&config::get().nerdgraph)
        .context("Failed to build NerdGraph client")?;
    info!(endpoint = gateway.endpoint(), "Using NerdGraph gateway");
    Ok(Arc::new(gateway))
}

fn parse_condition(raw: &str) -> Result<ConditionId> {
    match ConditionId::parse(raw) {
        Some(id) => Ok(id),
        None => bail!("'{raw}' is not a valid condition id"),
    }
}

async fn run_conditions(
    gateway: &dyn AnalyticsGateway,
    account: u64,
    search: Option<&str>,
) -> Result<()> {
    let catalog = load_catalog(gateway, &Account::new(account)).await;
    let filtered = filter_conditions(&catalog, search.unwrap_or_default());
    info!(total = catalog.len(), shown = filtered.len(), "Conditions loaded");
    println!("{}", serde_json::to_string_pretty(&filtered)?);
    Ok(())
}

async fn run_inspect(
    gateway: Arc<dyn AnalyticsGateway>,
    account: u64,
    condition: &str,
    threshold: Option<String>,
) -> Result<()> {
    let condition = Condition::new(parse_condition(condition)?);
    let mut handle = Session::from_config(gateway).spawn();

    handle
        .send(SelectionEvent::AccountChanged(Account::new(account)))
        .await?;
    let view = handle.wait_for(|v| v.phase.is_ready()).await?;

    if view.phase == Phase::ReadyEmpty {
        warn!(account_id = account, "No conditions available");
    } else if !view.catalog.iter().any(|c| c.id == condition.id) {
        warn!(condition_id = %condition.id, "Condition not in catalog for account");
    } else {
        handle
            .send(SelectionEvent::ConditionPicked(condition))
            .await?;
        handle
            .wait_for(|v| v.phase == Phase::ReadySelected && !v.loading)
            .await?;
        if let Some(text) = threshold {
            handle.send(SelectionEvent::ThresholdEdited(text)).await?;
        }
    }

    let machine = handle.close().await?;
    println!("{}", serde_json::to_string_pretty(&machine.view())?);
    Ok(())
}

fn run_queries(condition: Option<&str>, threshold: String, signal_query: Option<&str>) -> Result<()> {
    let condition = condition.map(parse_condition).transpose()?;
    let derived =
        DerivedQueries::for_parts(condition.as_ref(), signal_query, &Threshold::new(threshold));
    println!("{}", serde_json::to_string_pretty(&derived.panels())?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let tuner_config = match &args.config {
        Some(path) => TunerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TunerConfig::load(),
    };
    config::init(tuner_config);

    match &args.command {
        SubCommand::Conditions { account, search } => {
            let gateway = build_gateway(&args)?;
            run_conditions(gateway.as_ref(), *account, search.as_deref()).await
        }
        SubCommand::Inspect {
            account,
            condition,
            threshold,
        } => {
            let gateway = build_gateway(&args)?;
            run_inspect(gateway, *account, condition, threshold.clone()).await
        }
        SubCommand::Queries {
            condition,
            threshold,
            signal_query,
        } => run_queries(condition.as_deref(), threshold.clone(), signal_query.as_deref()),
    }
}
