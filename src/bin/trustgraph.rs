//! trustgraph CLI: train the transfer-graph model and score contracts.
//!
//! Subcommands: train, generate, latest. Results are printed as JSON.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use trustgraph::config::EngineConfig;
use trustgraph::engine::TrustEngine;
use trustgraph::graph::{ContractFilter, MemoryTransactionSource};
use trustgraph::monitoring::{init_logging, LogFormat, LogLevel};

/// Graph trust engine for token-transfer networks.
#[derive(Parser, Debug)]
#[command(name = "trustgraph", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (text, json).
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the model on a contract's transfers and keep the best checkpoint.
    Train(TrainArgs),
    /// Generate a synthetic graph and report centrality before and after.
    Generate(ContractArgs),
    /// Show the most recent transfer of an address.
    Latest(LatestArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// JSON array of transfer records.
    #[arg(long)]
    transfers: PathBuf,

    /// Contract address, or "all".
    #[arg(long, default_value = "all")]
    contract: String,
}

#[derive(Args, Debug)]
struct ContractArgs {
    /// JSON array of transfer records.
    #[arg(long)]
    transfers: PathBuf,

    /// Contract address, or "all".
    #[arg(long)]
    contract: String,
}

#[derive(Args, Debug)]
struct LatestArgs {
    #[command(flatten)]
    source: ContractArgs,

    /// Address whose latest transfer is wanted.
    #[arg(long)]
    address: String,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging)?;

    let engine = Arc::new(TrustEngine::new(config)?);

    match cli.command {
        Commands::Train(args) => {
            let source = MemoryTransactionSource::from_json_file(&args.transfers)?;
            let filter = ContractFilter::parse(&args.contract);
            let handle = engine.train_contract(&source, &filter).await?;
            let summary = handle.await.context("training task panicked")??;
            print_json(&summary)
        }
        Commands::Generate(args) => {
            let source = MemoryTransactionSource::from_json_file(&args.transfers)?;
            let filter = ContractFilter::parse(&args.contract);
            let report = engine.score_contract(&source, &filter).await?;
            print_json(&report)
        }
        Commands::Latest(args) => {
            let source = MemoryTransactionSource::from_json_file(&args.source.transfers)?;
            let filter = ContractFilter::parse(&args.source.contract);
            let latest = engine.latest_transfer(&source, &filter, &args.address).await?;
            print_json(&latest)
        }
    }
}
