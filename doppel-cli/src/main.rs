mod commands;
mod config;
mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::CliConfig;
use doppel_core::{
    Amount, EpochBirthdayOracle, Fid, GameStatus, LogNotifier, Notifier, WebhookNotifier,
};
use doppel_game::{DoppelGame, GameError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "doppel")]
#[command(about = "DoppelGamble - the birthday paradox betting game")]
#[command(version)]
struct Cli {
    /// Data directory for the game database and config.json
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Entry price in USDC, overriding config.json and DOPPEL_ENTRY_PRICE
    #[arg(long, global = true)]
    entry_price: Option<Amount>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the oldest open game
    Join {
        /// Farcaster id
        fid: Fid,
        /// Wallet address
        wallet: String,
        /// Birthday as MM-DD (looked up from the fid when omitted)
        #[arg(short, long)]
        birthday: Option<String>,
    },
    /// Bet on whether two players share a birthday
    Bet {
        player_id: Uuid,
        /// yes or no
        bet: String,
    },
    /// Record the entry payment
    Pay {
        player_id: Uuid,
        /// Transaction hash of the payment
        transaction_hash: String,
    },
    /// Leave a game before paying
    Cancel {
        player_id: Uuid,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Show a game and its players
    Status {
        /// Game id
        #[arg(short, long)]
        game: Option<Uuid>,
        /// Show the game this fid is playing
        #[arg(short, long)]
        fid: Option<Fid>,
    },
    /// List games, newest first
    List {
        /// Only games with this status (open, full, resolved)
        #[arg(short, long)]
        status: Option<GameStatus>,
    },
    /// Resolve every fully paid game
    Resolve {
        /// Keep sweeping until interrupted
        #[arg(short, long)]
        watch: bool,
        /// Seconds between sweeps (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
        /// Also sweep for due games every N seconds
        #[arg(short, long)]
        resolve_interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "doppel={0},doppel_game={0},doppel_core={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli_config = CliConfig::new(cli.data_dir, cli.verbose);
    tokio::fs::create_dir_all(cli_config.data_dir())
        .await
        .with_context(|| format!("failed to create {}", cli_config.data_dir().display()))?;

    let config = cli_config
        .game_config(cli.entry_price)
        .with_context(|| format!("invalid config in {}", cli_config.config_path().display()))?;

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(LogNotifier),
    };

    let game = DoppelGame::open(
        cli_config.data_dir(),
        config,
        Arc::new(EpochBirthdayOracle::new()),
        notifier,
    )
    .await
    .context("failed to open game database")?;

    // Execute command
    let result = match cli.command {
        Commands::Join {
            fid,
            wallet,
            birthday,
        } => commands::join(&game, fid, &wallet, birthday.as_deref()).await,
        Commands::Bet { player_id, bet } => commands::bet(&game, player_id, &bet).await,
        Commands::Pay {
            player_id,
            transaction_hash,
        } => commands::pay(&game, player_id, &transaction_hash).await,
        Commands::Cancel { player_id, force } => commands::cancel(&game, player_id, force).await,
        Commands::Status { game: game_id, fid } => commands::status(&game, game_id, fid).await,
        Commands::List { status } => commands::list(&game, status).await,
        Commands::Resolve { watch, interval } => commands::resolve(&game, watch, interval).await,
        Commands::Serve {
            port,
            resolve_interval,
        } => {
            let interval = resolve_interval.map(Duration::from_secs);
            return server::serve(Arc::new(game), port, interval).await;
        }
    };

    if let Err(e) = result {
        match e {
            GameError::AlreadyInGame { fid, game, player } => {
                eprintln!("Error: fid {} is already playing in game {}", fid, game.id);
                eprintln!("Your player ID there is {}", player.id);
            }
            GameError::AlreadyPaid(_) => {
                eprintln!("Error: {}", e);
                eprintln!("Paid players stay in the game until it resolves");
            }
            GameError::BetRequired(player_id) => {
                eprintln!("Error: place a bet before paying");
                eprintln!("Use 'doppel bet {} <yes|no>'", player_id);
            }
            GameError::GameNotFound(_) | GameError::PlayerNotFound(_) => {
                eprintln!("Error: {}", e);
                eprintln!("Use 'doppel list' to see available games");
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
