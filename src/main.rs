//! Binary entrypoint for the Immich slideshow.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use immich_slideshow::config::Configuration;
use immich_slideshow::immich::client::ImmichClient;
use immich_slideshow::slideshow::Slideshow;
use immich_slideshow::tasks::refresh::RefreshCoordinator;

#[derive(Debug, Parser)]
#[command(
    name = "immich-slideshow",
    version,
    about = "Rotating slideshow of photos from an Immich server"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Check connectivity and the api key, list albums, then exit
    #[arg(long)]
    probe: bool,

    /// Run a single refresh, print the candidate list, then exit
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("immich_slideshow={level}").parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        probe,
        dry_run,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    info!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let http = reqwest::Client::builder()
        .user_agent(concat!("immich-slideshow/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    if probe {
        return run_probe(&cfg, http).await;
    }
    if dry_run {
        return run_dry_run(&cfg, http).await;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let slideshow = Slideshow::start(&cfg, http, &cancel)?;
    let mut slides = slideshow.rotation().watch();
    let mut last_shown: Option<(String, usize)> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = slides.changed() => {
                if changed.is_err() {
                    break;
                }
                let size = slides
                    .borrow_and_update()
                    .current_image
                    .as_ref()
                    .map(|bytes| bytes.len());
                let Some(attrs) = slideshow.attributes() else {
                    debug!("rotation state changed with nothing to show");
                    continue;
                };
                let Some(size) = size else {
                    continue;
                };
                let key = (attrs.asset_id.clone(), size);
                if last_shown.as_ref() == Some(&key) {
                    continue;
                }
                info!(
                    asset_id = %attrs.asset_id,
                    filename = attrs.filename.as_deref().unwrap_or("-"),
                    captured_at = attrs.captured_at.as_deref().unwrap_or("-"),
                    position = attrs.position,
                    total = attrs.total_count,
                    mode = %attrs.configured_mode,
                    bytes = size,
                    "showing slide"
                );
                last_shown = Some(key);
            }
        }
    }

    slideshow.shutdown().await;
    Ok(())
}

async fn run_probe(cfg: &Configuration, http: reqwest::Client) -> Result<()> {
    let client = ImmichClient::from_config(http, cfg)?;
    client.ping().await.context("connectivity probe failed")?;
    println!("# server: {} (reachable, api key accepted)", client.host());

    let albums = client.albums().await.context("failed to list albums")?;
    println!("# albums: {}", albums.len());
    for album in albums {
        let count = album
            .asset_count
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        println!("  {}  {} ({} assets)", album.id, album.album_name, count);
    }
    Ok(())
}

async fn run_dry_run(cfg: &Configuration, http: reqwest::Client) -> Result<()> {
    let client = ImmichClient::from_config(http, cfg)?;
    let coordinator = RefreshCoordinator::from_config(client, cfg);
    let count = coordinator.refresh().await?;
    let state = coordinator.snapshot();

    println!(
        "# dry run\n# mode: {}\n# assets: {}\n",
        cfg.query.kind(),
        count
    );
    if let Some(err) = &state.last_error {
        println!("# diagnostic: {err}");
    }
    if state.is_empty() {
        println!("(no displayable assets)");
        return Ok(());
    }
    for (idx, asset) in state.assets.iter().enumerate() {
        println!(
            "  {:>4}: {}  {}  {}",
            idx + 1,
            asset.id,
            asset.original_file_name.as_deref().unwrap_or("-"),
            asset.taken_at().unwrap_or("-"),
        );
    }
    Ok(())
}
