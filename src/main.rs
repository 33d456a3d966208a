use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{ConfigCommand, LocalCommand, StatusCommand, SyncCommand, WordCommand};
use etymos::config::Config;
use etymos::db::{open_pool, WordRepository};
use etymos::offline::OfflineStore;

#[derive(Parser)]
#[command(name = "etymos")]
#[command(version)]
#[command(about = "Author etymology word records, offline or online", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored words
    Word(WordCommand),

    /// Manage the offline store
    Local(LocalCommand),

    /// Sync offline documents to the database
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),

    /// Check database connectivity
    Status(StatusCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "etymos=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.clone())?;

    match cli.command {
        Some(Commands::Word(cmd)) => {
            cmd.run(&config).await?;
        }
        Some(Commands::Local(cmd)) => {
            cmd.run(&offline_store(&config))?;
        }
        Some(Commands::Sync(cmd)) => {
            let pool = open_pool(&config.database_url.value).await?;
            let repo = WordRepository::new(pool);
            cmd.run(&repo, &offline_store(&config)).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config, cli.config)?;
        }
        Some(Commands::Status(cmd)) => {
            cmd.run(&config).await?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

fn offline_store(config: &Config) -> OfflineStore {
    OfflineStore::new(
        config.offline_path.value.clone(),
        config.max_local_items.value,
    )
}
