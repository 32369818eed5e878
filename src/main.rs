mod config;
mod core;
mod errors;
mod models;
mod services;
mod stores;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::Config;
use crate::core::Migrator;
use crate::services::http::RetryPolicy;
use crate::services::{AppleMusicService, SpotifyService, StreamingService};
use crate::stores::{InMemoryMatchCache, InMemoryMigrationLog, LogProgress};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Direction {
    /// Spotify playlist into the Apple Music library
    SpotifyToApple,
    /// Apple Music playlist into the Spotify account
    AppleToSpotify,
}

#[derive(Parser, Debug)]
#[command(name = "portify", about = "Migrate playlists between Apple Music and Spotify", version)]
struct Args {
    /// Source playlist URL
    #[arg(long)]
    playlist: String,

    /// Which way the playlist moves
    #[arg(long, value_enum)]
    direction: Direction,

    /// Apple Music storefront override (two-letter code)
    #[arg(long)]
    storefront: Option<String>,

    /// Path to a JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tracks resolved in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Verbose engine logging
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "portify=debug" } else { "portify=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(storefront) = args.storefront {
        config.apple_music.storefront = storefront;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    config.check_credentials()?;

    let apple: Arc<dyn StreamingService> =
        Arc::new(AppleMusicService::new(&config.apple_music, &config.http)?);
    let spotify: Arc<dyn StreamingService> =
        Arc::new(SpotifyService::new(&config.spotify, &config.http)?);

    let (source, destination) = match args.direction {
        Direction::SpotifyToApple => (spotify, apple),
        Direction::AppleToSpotify => (apple, spotify),
    };

    let migrator = Migrator::new(
        source,
        destination,
        Arc::new(InMemoryMatchCache::new()),
        Arc::new(InMemoryMigrationLog::new()),
        config.matching.clone(),
        RetryPolicy::from_config(&config.http),
        config.concurrency,
    );

    let run_id = Uuid::new_v4();
    info!(%run_id, playlist = %args.playlist, "portify.run");

    match migrator.migrate(&args.playlist, &LogProgress).await {
        Ok(result) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("serializing result")?
            );
            Ok(())
        }
        Err(e) => {
            error!(%run_id, error = %e, "portify.failed");
            Err(e.into())
        }
    }
}
