mod setup;
mod sync;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::sync::SyncCommands;

#[derive(Debug, Parser)]
#[command(name = "mportal-cli")]
#[command(about = "Multi-channel portal command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Upsert the channel registry from a YAML file
    SeedChannels {
        /// Seed file; defaults to MPORTAL_CHANNELS_PATH
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Create an admin account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Pull products or orders from a channel into the catalog
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Rebuild daily sales summary rows for an inclusive date range
    Rollup {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Probe a channel's API credentials
    CheckConnection {
        /// Channel code, e.g. `shopify-us`
        #[arg(long)]
        channel: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("mportal-cli: no command given; run with --help for usage");
        return Ok(());
    };

    let config = mportal_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = mportal_db::connect_from_config(&config).await?;

    match command {
        Commands::Migrate => setup::run_migrate(&pool).await,
        Commands::SeedChannels { path } => {
            let path = path.unwrap_or_else(|| config.channels_path.clone());
            setup::run_seed_channels(&pool, &path).await
        }
        Commands::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
        } => {
            setup::run_create_admin(
                &pool,
                &email,
                &password,
                first_name.as_deref(),
                last_name.as_deref(),
            )
            .await
        }
        Commands::Sync { command } => sync::run_sync(&pool, &config, command).await,
        Commands::Rollup { from, to } => sync::run_rollup(&pool, from, to).await,
        Commands::CheckConnection { channel } => {
            sync::run_check_connection(&pool, &config, &channel).await
        }
    }
}

#[cfg(test)]
mod tests;
