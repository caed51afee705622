use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use history_ingestor::{
    AppConfig, IngestSettings, IngestionScheduler,
    models::{KlineInterval, Resource},
    providers::binance_rest::BinanceRestApi,
    provision::{ProxyProvisioner, SshProvisioner, StaticInventory, StaticProvisioner},
};
use history_sync::{
    DieselSink, WatermarkRepo,
    db::{connection, migrate},
    tz,
};
use shared_utils::env::get_env_var;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Backfill Binance market history into SQLite")]
struct Cli {
    /// TOML config; built-in presets are used when omitted.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending schema migrations and exit.
    Migrate,
    /// Candlesticks for one symbol and interval.
    Klines {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "1s")]
        interval: KlineInterval,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Aggregated trades for one symbol.
    Trades {
        #[arg(long)]
        symbol: String,
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// RFC 3339, or a naive date-time read in --tz.
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
    /// IANA zone for naive --start/--end values (default UTC).
    #[arg(long)]
    tz: Option<String>,
    /// Skip to the stored watermark when --start lies inside the stored span.
    #[arg(long)]
    resume: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let database_url = get_env_var("DATABASE_URL")?;
    migrate::run_all(&database_url)?;

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    match cli.cmd {
        Cmd::Migrate => Ok(()),
        Cmd::Klines {
            symbol,
            interval,
            range,
        } => {
            let resource = Resource::klines(symbol, interval);
            sync(&config, config.klines_settings()?, resource, &range, &database_url).await
        }
        Cmd::Trades { symbol, range } => {
            let resource = Resource::agg_trades(symbol);
            sync(&config, config.trades_settings()?, resource, &range, &database_url).await
        }
    }
}

async fn sync(
    config: &AppConfig,
    settings: IngestSettings,
    resource: Resource,
    range: &RangeArgs,
    database_url: &str,
) -> Result<()> {
    let (mut start, end) = parse_range(range)?;

    let conn = connection::connect_shared(database_url)?;
    let watermarks = Arc::new(WatermarkRepo::new(conn.clone()));
    let mut scheduler = IngestionScheduler::new(
        settings.validate_for(&resource)?,
        Arc::new(BinanceRestApi::new(&config.api)?),
        provisioner(config),
        Arc::new(StaticInventory::new(config.proxy.hosts.clone())),
        Arc::new(DieselSink::new(conn)),
    )
    .with_progress(watermarks.clone());

    if range.resume {
        start = scheduler.resume_point(&resource, start).await?;
        info!(dataset = %resource.dataset_key(), from = %start, "resuming");
    }
    if start >= end {
        info!(dataset = %resource.dataset_key(), "already up to date");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current chunk");
            on_signal.cancel();
        }
    });

    let summary = scheduler.run(&resource, start, end, &cancel).await?;
    if !summary.windows_failed.is_empty() {
        for failure in &summary.windows_failed {
            warn!(window = %failure.window, attempts = failure.attempts, reason = %failure.reason, "window not fetched");
        }
        watermarks
            .record_error(&resource.dataset_key(), &summary.to_string())
            .await?;
    }

    println!("{summary}");
    Ok(())
}

fn parse_range(range: &RangeArgs) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let tz_name = range.tz.as_deref();
    let start = tz::parse_cli_ts(&range.start, tz_name).context("--start")?;
    let end = tz::parse_cli_ts(&range.end, tz_name).context("--end")?;
    anyhow::ensure!(start <= end, "--start {start} is after --end {end}");
    Ok((start, end))
}

fn provisioner(config: &AppConfig) -> Arc<dyn ProxyProvisioner> {
    let proxy = &config.proxy;
    match &proxy.ssh {
        Some(ssh) => Arc::new(SshProvisioner::new(
            ssh,
            proxy.port,
            proxy.credential_env.clone(),
        )),
        None => Arc::new(StaticProvisioner::new(
            proxy.port,
            proxy.credential_env.clone(),
        )),
    }
}
