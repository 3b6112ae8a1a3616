mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "trapdoor")]
#[command(about = "Two-sided wagering rounds with oracle-driven resolution")]
#[command(version)]
struct Cli {
    /// Data directory for game state and round history
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
    /// Create a fresh game instance
    Init {
        /// Minimum round interval in seconds
        #[arg(long, default_value_t = 600)]
        interval_secs: u64,
        /// USD price of one whole coin, scaled by 10^8
        #[arg(long, default_value_t = 100_000_000)]
        price: u64,
    },
    /// Enter the current round on a side
    Enter {
        /// Side to join: left or right
        side: String,
        /// Payment amount in base units
        amount: u64,
        /// Participant identifier (generated when omitted)
        #[arg(long)]
        participant: Option<String>,
    },
    /// Close the round and request randomness
    Reveal,
    /// Deliver the randomness fulfillment and resolve the round
    Fulfill {
        /// Override the random value (parity decides the side)
        #[arg(long)]
        value: Option<u64>,
    },
    /// Show the current round
    Status,
    /// List resolved rounds
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show treasury balances
    Balances,
    /// Withdraw accumulated fees to the administrator
    WithdrawFees,
    /// Update the minimum round interval (administrator only)
    SetInterval {
        /// New interval in seconds
        secs: u64,
    },
    /// Publish a new oracle price
    SetPrice {
        /// USD price of one whole coin, scaled by 10^8
        price: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "trapdoor={},trapdoor_game={},trapdoor_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trapdoor")
    });

    tokio::fs::create_dir_all(&data_dir).await?;

    let result = match cli.command {
        Commands::Init {
            interval_secs,
            price,
        } => commands::init_game(&data_dir, interval_secs, price).await,
        Commands::Enter {
            side,
            amount,
            participant,
        } => commands::enter_game(&data_dir, &side, amount, participant.as_deref()).await,
        Commands::Reveal => commands::trigger_reveal(&data_dir).await,
        Commands::Fulfill { value } => commands::fulfill(&data_dir, value).await,
        Commands::Status => commands::show_status(&data_dir).await,
        Commands::History { limit } => commands::show_history(&data_dir, limit).await,
        Commands::Balances => commands::show_balances(&data_dir).await,
        Commands::WithdrawFees => commands::withdraw_fees(&data_dir).await,
        Commands::SetInterval { secs } => commands::set_interval(&data_dir, secs).await,
        Commands::SetPrice { price } => commands::set_price(&data_dir, price).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
