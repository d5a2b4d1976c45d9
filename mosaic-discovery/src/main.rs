//! mosaic-discovery - discovery feed from local media, an asset manager
//! and browser bookmarks
//!
//! Resolves the configuration, runs one refresh and prints the feed as
//! JSON. With `--watch` it keeps refreshing whenever the snapshot is older
//! than the configured TTL and prints each newly published feed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mosaic_common::config::{ConfigResolver, SourcesConfig};
use mosaic_discovery::{DiscoveryConfig, DiscoveryEngine, Feed};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mosaic-discovery
#[derive(Parser, Debug)]
#[command(name = "mosaic-discovery")]
#[command(about = "Aggregate media and bookmarks into a discovery feed")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder of the local media library
    #[arg(long)]
    media_root: Option<PathBuf>,

    /// Base URL of the asset-manager API
    #[arg(long)]
    asset_manager_url: Option<String>,

    /// Library directory of the asset manager
    #[arg(long)]
    asset_manager_library: Option<PathBuf>,

    /// Browser bookmark file
    #[arg(long)]
    bookmarks: Option<PathBuf>,

    /// Keep running and refresh when the snapshot goes stale
    #[arg(short, long)]
    watch: bool,

    /// Pretty-print the feed JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml = ConfigResolver::new()
        .with_config_path(args.config.clone())
        .with_source_overrides(SourcesConfig {
            media_root: args.media_root.clone(),
            asset_manager_url: args.asset_manager_url.clone(),
            asset_manager_library: args.asset_manager_library.clone(),
            bookmarks_path: args.bookmarks.clone(),
            ..Default::default()
        })
        .resolve()
        .context("Failed to resolve configuration")?;

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting mosaic-discovery {}", env!("CARGO_PKG_VERSION"));

    let config = DiscoveryConfig::from_toml(&toml).context("Invalid configuration")?;
    if !config.has_any_source() {
        bail!("No source configured: set a media root, an asset-manager URL or a bookmark file");
    }

    let engine = DiscoveryEngine::new(config).context("Failed to initialize connectors")?;
    info!("Discovery engine initialized");

    let report = engine.refresh().await;
    log_sources(&engine);
    print_feed(&engine.feed(), args.pretty)?;

    if !args.watch {
        return Ok(());
    }

    let mut last_printed = report.generation;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(report) = engine.refresh_if_stale(mosaic_common::time::now()).await {
                    if report.published() && report.generation > last_printed {
                        last_printed = report.generation;
                        log_sources(&engine);
                        print_feed(&engine.feed(), args.pretty)?;
                    }
                }
            }
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

fn log_sources(engine: &DiscoveryEngine) {
    for status in engine.source_status().iter().filter(|s| s.enabled) {
        match &status.last_error {
            Some(error) => warn!(
                source = %status.source,
                stale = status.stale,
                assets = status.asset_count,
                "Source degraded: {}",
                error
            ),
            None => info!(source = %status.source, assets = status.asset_count, "Source ok"),
        }
    }
}

fn print_feed(feed: &Feed, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(feed)?
    } else {
        serde_json::to_string(feed)?
    };
    println!("{}", json);
    Ok(())
}
