//! Channel sync, connection checks and the sales rollup.
//!
//! Runs here share the engine the HTTP API uses and are logged with
//! `trigger_source = 'cli'`.

use chrono::NaiveDate;
use clap::Subcommand;
use mportal_channels::{ChannelConnector, ChannelError, ConnectionReport};
use mportal_core::{AppConfig, ChannelKind};
use mportal_db::ChannelRow;
use mportal_sync::{SyncEngine, SyncOptions, SyncReport, TriggerSource};

/// Sub-commands available under `sync`.
#[derive(Debug, Subcommand)]
pub enum SyncCommands {
    /// Import the channel's product listings
    Products {
        /// Channel code, e.g. `shopify-us`
        #[arg(long)]
        channel: String,
        /// Page size requested from the channel; defaults to MPORTAL_SYNC_DEFAULT_LIMIT
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Import the channel's recent orders
    Orders {
        #[arg(long)]
        channel: String,
        #[arg(long)]
        limit: Option<u32>,
    },
}

async fn load_channel(
    pool: &sqlx::PgPool,
    code: &str,
) -> anyhow::Result<(ChannelRow, ChannelKind)> {
    let channel = match mportal_db::get_channel_by_code(pool, code).await {
        Ok(channel) => channel,
        Err(mportal_db::DbError::NotFound) => anyhow::bail!("channel '{code}' not found"),
        Err(e) => return Err(e.into()),
    };
    let kind: ChannelKind = channel.kind.parse()?;
    Ok((channel, kind))
}

fn print_report(report: &SyncReport) -> anyhow::Result<()> {
    println!(
        "{} sync of {}: {} processed, {} created, {} updated, {} failed",
        report.sync_type.as_str(),
        report.channel_code,
        report.processed,
        report.created,
        report.updated,
        report.failed,
    );
    for error in &report.errors {
        println!("  {}: {}", error.key, error.reason);
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Run a one-shot sync for the named channel.
///
/// # Errors
///
/// Returns an error if the channel is unknown or inactive, its credentials
/// are not configured, or the fetch fails. Per-record failures are reported,
/// not propagated.
pub(crate) async fn run_sync(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: SyncCommands,
) -> anyhow::Result<()> {
    let (code, limit, products) = match command {
        SyncCommands::Products { channel, limit } => (channel, limit, true),
        SyncCommands::Orders { channel, limit } => (channel, limit, false),
    };

    let (channel, kind) = load_channel(pool, &code).await?;
    let connector = ChannelConnector::for_channel(kind, channel.base_url.as_deref(), config)?;
    let engine = SyncEngine::new(pool.clone());
    let options = SyncOptions {
        limit: limit.unwrap_or(config.sync_default_limit),
        trigger: TriggerSource::Cli,
        user_id: None,
    };

    let report = if products {
        engine.sync_products(&channel, &connector, &options).await?
    } else {
        engine.sync_orders(&channel, &connector, &options).await?
    };
    print_report(&report)
}

/// Probe the credentials of the named channel. Prints the report and fails
/// when the probe does.
///
/// # Errors
///
/// Returns an error if the channel is unknown or the probe fails.
pub(crate) async fn run_check_connection(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    code: &str,
) -> anyhow::Result<()> {
    let (channel, kind) = load_channel(pool, code).await?;
    let report = match ChannelConnector::for_channel(kind, channel.base_url.as_deref(), config) {
        Ok(connector) => connector.test_connection().await,
        Err(ChannelError::NotConfigured(platform)) => ConnectionReport::not_configured(platform),
        Err(e) => ConnectionReport::from_error(kind.as_str(), None, &e),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.success {
        anyhow::bail!("connection check failed for channel '{code}': {}", report.message);
    }
    Ok(())
}

/// Rebuild `daily_sales_summary` for `from..=to`.
///
/// # Errors
///
/// Returns an error if `from` is after `to` or the refresh fails.
pub(crate) async fn run_rollup(
    pool: &sqlx::PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<()> {
    if from > to {
        anyhow::bail!("--from ({from}) must not be after --to ({to})");
    }
    let rows = mportal_db::refresh_daily_summary(pool, from, to).await?;
    tracing::info!(%from, %to, rows, "daily sales summary refreshed");
    println!("refreshed {rows} summary row(s) for {from}..={to}");
    Ok(())
}
