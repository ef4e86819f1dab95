//! Summon Relay
//!
//! Runs the MCP server the desktop agent submits results to, and offers the
//! game-side queue operations from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use summon_relay_core::{CreatureId, ExecutionId, RawResult, ResultType};
use summon_relay_server::{RelayServer, ResultRelay};
use summon_relay_store::{CreatureAssets, PollWindow, RelayConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "summon-relay")]
#[command(about = "Result relay between the desktop agent and the summon battle game")]
#[command(version)]
struct Cli {
    /// Assets root; results are queued under <assets>/mcp_results
    #[arg(short, long, global = true, env = "SUMMON_RELAY_ASSETS")]
    assets_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true, env = "SUMMON_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MCP over stdio
    Serve,
    /// Queue a result, replacing any waiting one
    Submit {
        /// Result text; `-` reads stdin
        result: String,
        /// Also register creatures and extract models
        #[arg(long)]
        process: bool,
    },
    /// Take the queued result, or the one with a given id
    Fetch {
        #[arg(long)]
        id: Option<String>,
    },
    /// Report whether a result is queued
    Status,
    /// List stored results without consuming them
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(short = 't', long = "type")]
        result_type: Option<String>,
    },
    /// Discard a queued result
    Delete { id: String },
    /// Wait for a queued result, or for a creature's files with --creature
    Wait {
        #[arg(long)]
        creature: Option<String>,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        attempts: Option<u32>,
    },
}

fn load_config(cli: &Cli) -> Result<RelayConfig> {
    let mut config = match &cli.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if let Some(assets_dir) = &cli.assets_dir {
        config.assets_dir = assets_dir.clone();
    }
    Ok(config)
}

fn read_result(arg: String) -> Result<String> {
    if arg != "-" {
        return Ok(arg);
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read result from stdin")?;
    Ok(text)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn window(base: PollWindow, interval_ms: Option<u64>, attempts: Option<u32>) -> PollWindow {
    PollWindow::new(
        interval_ms.unwrap_or(base.interval_ms),
        attempts.unwrap_or(base.max_attempts),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries MCP traffic, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "summon_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!("Assets root: {}", config.assets_dir.display());

    let relay = ResultRelay::open(&config).context("Failed to open result store")?;

    match cli.command {
        Command::Serve => {
            RelayServer::new(relay)
                .run_stdio()
                .await
                .context("MCP server error")?;
        }
        Command::Submit { result, process } => {
            let raw = RawResult::from(read_result(result)?);
            if process {
                print_json(&relay.submit_and_process(raw).await?)?;
            } else {
                print_json(&relay.submit(raw).await?)?;
            }
        }
        Command::Fetch { id } => {
            let fetched = match id {
                Some(id) => relay.fetch(&ExecutionId::from(id)).await?,
                None => relay.fetch_current().await?,
            };
            match fetched {
                Some(fetched) => print_json(&fetched)?,
                None => anyhow::bail!("No result queued"),
            }
        }
        Command::Status => {
            print_json(&serde_json::json!({ "hasResult": relay.has_result().await? }))?;
        }
        Command::List { limit, result_type } => {
            let summaries = relay
                .list(limit, result_type.map(ResultType::from))
                .await?;
            print_json(&summaries)?;
        }
        Command::Delete { id } => {
            let deleted = relay.delete(&ExecutionId::from(id)).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
        Command::Wait {
            creature: Some(creature),
            interval_ms,
            attempts,
        } => {
            let creature_id = CreatureId::from(creature);
            if !creature_id.is_safe_key() {
                anyhow::bail!("Invalid creature id {:?}", creature_id.as_str());
            }
            CreatureAssets::new(&config.assets_dir)
                .wait_for_summon(&creature_id, window(config.summon_poll, interval_ms, attempts))
                .await
                .with_context(|| format!("Creature {} did not finish", creature_id))?;
            print_json(&serde_json::json!({ "creatureId": creature_id, "status": "completed" }))?;
        }
        Command::Wait {
            creature: None,
            interval_ms,
            attempts,
        } => {
            let fetched = relay
                .wait_for_result(window(relay.result_poll(), interval_ms, attempts))
                .await?;
            print_json(&fetched)?;
        }
    }

    Ok(())
}
