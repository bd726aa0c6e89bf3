//! TWS daemon: deploys a node from config and replays command logs.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tws_node::{init_logging, Command, NodeConfig, NodeSummary, Outcome, TwsNode};
use tws_types::{SystemClock, Timestamp};
use tws_utils::format_duration;

#[derive(Parser)]
#[command(name = "tws-daemon", about = "TWS token and staking ledger")]
struct Cli {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// Overrides the config file's level.
    #[arg(long, global = true, env = "TWS_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Action,
}

#[derive(clap::Subcommand)]
enum Action {
    /// Print a default configuration file.
    InitConfig,

    /// Deploy from config and apply a JSON-lines command log in order.
    Replay {
        /// Path to the TOML configuration file.
        #[arg(long, env = "TWS_CONFIG")]
        config: PathBuf,

        /// Command log: one `{"at": <secs>, "op": ..., ...}` object per line.
        log: PathBuf,

        /// Stop at the first rejected command.
        #[arg(long)]
        fail_fast: bool,

        /// Write a state snapshot here once the log is applied.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Deploy from config and print the resulting state.
    Info {
        /// Path to the TOML configuration file.
        #[arg(long, env = "TWS_CONFIG")]
        config: PathBuf,
    },
}

/// One line of a replay log.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    /// Seconds since the Unix epoch at which the command runs.
    at: u64,
    #[serde(flatten)]
    command: Command,
}

/// Printed for every replayed line.
#[derive(Serialize)]
struct LineReport<'a> {
    line: usize,
    at: u64,
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Action::InitConfig => {
            tws_utils::init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            print!("{}", NodeConfig::default().to_toml_string()?);
        }
        Action::Replay {
            config,
            log,
            fail_fast,
            snapshot,
        } => {
            let config = load_config(&config, cli.log_level)?;
            replay(config, &log, fail_fast, snapshot.as_deref())?;
        }
        Action::Info { config } => {
            let config = load_config(&config, cli.log_level)?;
            let node = TwsNode::deploy(config, Arc::new(SystemClock))?;
            print_summary(&node.summary()?)?;
        }
    }
    Ok(())
}

fn load_config(path: &Path, log_level: Option<String>) -> anyhow::Result<NodeConfig> {
    let mut config = NodeConfig::from_toml_file(path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    if let Some(level) = log_level {
        config.log_level = level;
    }
    init_logging(config.log_format()?, &config.log_level);
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

fn replay(
    config: NodeConfig,
    log: &Path,
    fail_fast: bool,
    snapshot: Option<&Path>,
) -> anyhow::Result<()> {
    let mut node = TwsNode::deploy(config, Arc::new(SystemClock))?;
    node.subscribe(Box::new(|event| {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }));

    let file = File::open(log).with_context(|| format!("opening {}", log.display()))?;
    let mut last_at = Timestamp::EPOCH;
    let (mut applied, mut rejected) = (0usize, 0usize);

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let entry: LogEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("{}:{line_no}: malformed entry", log.display()))?;
        let op = entry.command.name();
        last_at = Timestamp::new(entry.at);

        let report = match node.execute_at(entry.command, last_at) {
            Ok(outcome) => {
                applied += 1;
                LineReport {
                    line: line_no,
                    at: entry.at,
                    op,
                    outcome: Some(outcome),
                    error: None,
                }
            }
            Err(e) => {
                rejected += 1;
                LineReport {
                    line: line_no,
                    at: entry.at,
                    op,
                    outcome: None,
                    error: Some(e.to_string()),
                }
            }
        };
        println!("{}", serde_json::to_string(&report)?);
        if fail_fast && report.error.is_some() {
            anyhow::bail!("{}:{line_no}: {op} rejected", log.display());
        }
    }

    node.check_invariants_at(last_at)?;
    tracing::info!(applied, rejected, "replay finished");

    if let Some(path) = snapshot {
        node.save_snapshot(path)
            .with_context(|| format!("writing snapshot to {}", path.display()))?;
    }

    print_summary(&node.summary_at(last_at)?)?;
    if let Some(metrics) = node.metrics() {
        print!("{}", metrics.encode()?);
    }
    Ok(())
}

fn print_summary(summary: &NodeSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    let countdown = if summary.next_sanitise_in == 0 {
        "now".to_string()
    } else {
        format!("in {}", format_duration(summary.next_sanitise_in))
    };
    eprintln!(
        "supply {} | staked {} by {} | reward pool {} | next sanitise {countdown}",
        summary.total_supply, summary.total_staked, summary.stakers, summary.reward_pool,
    );
    Ok(())
}
