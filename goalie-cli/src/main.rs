mod commands;

use clap::{Parser, Subcommand};
use goalie_core::{SqliteChallengeStore, Storage};
use goalie_engine::{PaperPayout, SettlementEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "goalie")]
#[command(about = "Goalie 3x3 grid-wager CLI - hide a cell, take a guess")]
#[command(version)]
struct Cli {
    /// Data directory for challenge storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new challenge with a hidden target cell
    Create {
        /// Creator wallet address
        wallet: String,
        /// Target row: top, middle or bottom
        vertical: String,
        /// Target column: left, center or right
        horizontal: String,
        /// Stake each side commits, in base token units
        amount: u64,
        /// Funding commitment reference
        #[arg(long)]
        proof: String,
    },
    /// Guess the target cell of an open challenge
    Guess {
        /// Challenger wallet address
        wallet: String,
        /// Challenge ID to join
        challenge_id: String,
        /// Guessed row: top, middle or bottom
        vertical: String,
        /// Guessed column: left, center or right
        horizontal: String,
        /// Funding commitment reference
        #[arg(long)]
        proof: String,
    },
    /// Settle a full challenge now
    Settle {
        /// Challenge ID
        challenge_id: String,
    },
    /// Show challenge details
    Status {
        /// Challenge ID
        challenge_id: String,
    },
    /// List challenges
    List {
        /// Only challenges created by this wallet
        #[arg(long)]
        creator: Option<String>,
        /// Only challenges this wallet has joined
        #[arg(long)]
        challenger: Option<String>,
        /// Include completed challenges
        #[arg(long)]
        all: bool,
    },
    /// Run the fullness scanner until interrupted
    Watch {
        /// Seconds between scan passes
        #[arg(long, default_value_t = 60)]
        period: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "goalie={},goalie_engine={},goalie_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("goalie")
    });

    let storage = Arc::new(Storage::new(&data_dir.join("goalie.db")).await?);
    let store = Arc::new(SqliteChallengeStore::new(storage.clone()));
    let payout = Arc::new(PaperPayout::new(storage.clone()));
    let engine = Arc::new(SettlementEngine::new(store.clone(), payout));

    // Execute command
    let result = match cli.command {
        Commands::Create {
            wallet,
            vertical,
            horizontal,
            amount,
            proof,
        } => commands::create_challenge(&engine, &wallet, &vertical, &horizontal, amount, &proof).await,
        Commands::Guess {
            wallet,
            challenge_id,
            vertical,
            horizontal,
            proof,
        } => {
            commands::submit_guess(&engine, &wallet, &challenge_id, &vertical, &horizontal, &proof)
                .await
        }
        Commands::Settle { challenge_id } => commands::settle(&engine, &challenge_id).await,
        Commands::Status { challenge_id } => {
            commands::show_status(&store, &storage, &challenge_id).await
        }
        Commands::List {
            creator,
            challenger,
            all,
        } => commands::list_challenges(&store, creator.as_deref(), challenger.as_deref(), all).await,
        Commands::Watch { period } => commands::watch(engine.clone(), period).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
