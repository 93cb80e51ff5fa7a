//! GeoMarket CLI
//!
//! Command-line interface for the spatial market settlement engine:
//! inspect the market, discover positions, and build or submit the
//! stake, resolve, and claim transactions.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use geomarket_chain::{MarketClient, MarketConfig};
use geomarket_core::{
    format_address, format_cell_id, parse_address, CallRequest, GeoPoint, MarketPhase,
};
use geomarket_settings::Settings;
use geomarket_settlement::{ResolutionService, SettlementEngine, Submitter};

/// GeoMarket - settle and claim geographic prediction markets
#[derive(Parser)]
#[command(name = "geomarket")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file path (default: ~/.geomarket/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Node JSON-RPC endpoint (overrides settings)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Market contract address (overrides settings)
    #[arg(long)]
    market: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show market status
    Status,

    /// Discover a wallet's live positions
    Positions {
        /// Wallet address to scan for
        address: String,
    },

    /// Build a stake on the given coordinates
    Stake {
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lon: f64,
        /// Stake amount in wei
        amount: u128,
        /// Submit through the connected node instead of printing
        #[arg(long)]
        submit: bool,
    },

    /// Close and resolve the market at the winning coordinates
    Resolve {
        /// Winning latitude in degrees
        lat: f64,
        /// Winning longitude in degrees
        lon: f64,
        /// Submit through the connected node instead of printing
        #[arg(long)]
        submit: bool,
    },

    /// Claim winnings for a wallet's positions
    Claim {
        /// Wallet to claim for (defaults to the configured sender)
        #[arg(long)]
        address: Option<String>,
        /// Submit through the connected node instead of printing
        #[arg(long)]
        submit: bool,
    },

    /// Aggregate staked amounts per cell from recent history
    Cells,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path).context("failed to load settings")?,
        None => Settings::load_or_default().context("failed to load settings")?,
    };

    let client = build_client(&cli, &settings)?;
    let service = settings.resolution.api_url.clone().map(ResolutionService::new);
    let engine = SettlementEngine::new(&client, service);

    match cli.command {
        Commands::Status => status(&engine).await,
        Commands::Positions { address } => positions(&engine, &address).await,
        Commands::Stake { lat, lon, amount, submit } => {
            let point = GeoPoint::from_degrees(lat, lon)?;
            let call = engine.prepare_stake(point, amount);
            finish(&client, vec![call], submit).await
        }
        Commands::Resolve { lat, lon, submit } => {
            let point = GeoPoint::from_degrees(lat, lon)?;
            let calls = engine.prepare_resolution(point).await?;
            finish(&client, calls, submit).await
        }
        Commands::Claim { address, submit } => {
            let staker = match address {
                Some(raw) => parse_address(&raw)?,
                None => client
                    .sender()
                    .context("no wallet given: pass --address or configure a sender")?,
            };
            let calls = engine.prepare_claims(&staker).await?;
            finish(&client, calls, submit).await
        }
        Commands::Cells => cells(&engine).await,
    }
}

/// Build the live chain client from flags and settings.
fn build_client(cli: &Cli, settings: &Settings) -> Result<MarketClient> {
    let market = match &cli.market {
        Some(raw) => parse_address(raw)?,
        None => settings.market_address().context(
            "market address required: pass --market or set it in settings",
        )?,
    };
    let rpc_url = cli
        .rpc_url
        .clone()
        .unwrap_or_else(|| settings.market.rpc_url.clone());

    let mut config = MarketConfig::live(rpc_url, market);
    config.deploy_block = settings.market.deploy_block;
    config.sender = settings.sender_address()?;
    Ok(MarketClient::new(config))
}

async fn status(engine: &SettlementEngine<'_>) -> Result<()> {
    let snapshot = engine.market_status().await?;
    let now = unix_now();

    let phase = match snapshot.phase(now) {
        MarketPhase::Open => "open",
        MarketPhase::Closed => "closed",
        MarketPhase::Resolved => "resolved",
    };
    println!("phase:         {}", phase);
    println!("total staked:  {} wei", snapshot.total_staked);
    println!("owner:         {}", format_address(&snapshot.owner));
    println!("resolver:      {}", format_address(&snapshot.resolver));

    if snapshot.trading_close == 0 {
        println!("trading close: not set");
    } else if now < snapshot.trading_close {
        let remaining = snapshot.trading_close - now;
        println!(
            "trading close: in {}d {}h",
            remaining / 86_400,
            (remaining % 86_400) / 3_600,
        );
    } else {
        println!("trading close: passed");
    }

    if snapshot.dispute_end != 0 {
        println!("dispute end:   {}", snapshot.dispute_end);
    }
    if let Some(point) = snapshot.resolved {
        println!("resolved at:   {}", point);
    }
    Ok(())
}

async fn positions(engine: &SettlementEngine<'_>, address: &str) -> Result<()> {
    let staker = parse_address(address)?;
    let positions = engine.discover_positions(&staker).await?;

    println!("{} live position(s)", positions.len());
    for position in positions {
        println!(
            "  id {}  at {}  balance {} wei",
            format_cell_id(&position.id),
            position.point,
            position.balance,
        );
    }
    Ok(())
}

async fn cells(engine: &SettlementEngine<'_>) -> Result<()> {
    let totals = engine.cell_totals().await?;

    println!("{} staked cell(s) in recent history", totals.len());
    for cell in totals {
        println!(
            "  id {}  at {}  total {} wei",
            format_cell_id(&cell.id),
            cell.point,
            cell.total,
        );
    }
    Ok(())
}

/// Print the prepared calls, or submit them when asked to.
async fn finish(client: &MarketClient, calls: Vec<CallRequest>, submit: bool) -> Result<()> {
    if !submit {
        println!("{} call(s) prepared (pass --submit to send):", calls.len());
        for call in &calls {
            let value = call.value.map(|v| format!("  value {} wei", v)).unwrap_or_default();
            println!("  to {}  data 0x{}{}", format_address(&call.to), hex::encode(&call.data), value);
        }
        return Ok(());
    }

    let mut submitter = Submitter::new(client);
    let hashes = submitter.submit_all(&calls).await?;
    info!("submitted {} transaction(s)", hashes.len());
    for hash in hashes {
        println!("0x{}", hex::encode(hash));
    }
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}
