use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator_core::{storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "gator")]
#[command(author, version, about = "A multi-user RSS feed aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user and log in as them
    Register {
        name: String,
    },
    /// Switch to an existing user
    Login {
        name: String,
    },
    /// Delete every user along with their feeds, follows and posts
    Reset,
    /// List all users
    Users,
    /// Register a feed and follow it
    Addfeed {
        /// Display name for the feed
        name: String,
        /// RSS feed URL
        url: String,
    },
    /// List all feeds
    Feeds,
    /// Follow a feed someone already added
    Follow {
        url: String,
    },
    /// List the feeds you follow
    Following,
    /// Show the newest posts from the feeds you follow
    Browse {
        #[arg(default_value_t = 2)]
        limit: u32,
    },
    /// Collect feeds until interrupted, one feed per interval
    Agg {
        /// Time between requests, e.g. 30s, 1m, 1h30m
        time_between_reqs: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Initialize database
    let db = Database::new(&config).await?;

    match cli.command {
        Commands::Register { name } => commands::register::run(&db, &mut config, &name).await,
        Commands::Login { name } => commands::login::run(&db, &mut config, &name).await,
        Commands::Reset => commands::reset::run(&db).await,
        Commands::Users => commands::users::run(&db, &config).await,
        Commands::Addfeed { name, url } => {
            commands::addfeed::run(&db, &config, &name, &url).await
        }
        Commands::Feeds => commands::feeds::run(&db).await,
        Commands::Follow { url } => commands::follow::run(&db, &config, &url).await,
        Commands::Following => commands::following::run(&db, &config).await,
        Commands::Browse { limit } => commands::browse::run(&db, &config, limit).await,
        Commands::Agg { time_between_reqs } => {
            commands::agg::run(db, &config, time_between_reqs.as_deref()).await
        }
    }
}
