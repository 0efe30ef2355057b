//! Classifier ingest driver.
//!
//! Loads an address object dump and an abbreviation dump into a new dataset
//! version, publishes it, and retires the version it replaced.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use addressok::build::{refresh, Refresh};
use addressok::config::Config;
use addressok::feed::FeedFiles;
use addressok::store;
use addressok::version::VersionManager;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Build and publish a classifier dataset version")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding AS_ADDROBJ_*.XML and AS_SOCRBASE_*.XML
    #[arg(long, conflicts_with_all = ["addrobj", "socrbase"])]
    feed_dir: Option<PathBuf>,

    /// Address object document
    #[arg(long, requires = "socrbase")]
    addrobj: Option<PathBuf>,

    /// Abbreviation document
    #[arg(long, requires = "addrobj")]
    socrbase: Option<PathBuf>,

    /// Upstream release date; taken from the feed file name when omitted
    #[arg(long)]
    source_date: Option<String>,

    /// Rebuild even if the published version has the same source date
    #[arg(long)]
    force: bool,

    /// Record store directory, overrides the config file
    #[arg(long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("AddressOK Ingest");

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(path) = &args.store {
        config.store.path = path.clone();
    }

    let feed = match (&args.feed_dir, &args.addrobj, &args.socrbase) {
        (Some(dir), _, _) => FeedFiles::discover(dir)
            .with_context(|| format!("No feed documents in {}", dir.display()))?,
        (None, Some(addrobj), Some(socrbase)) => FeedFiles {
            address_objects: addrobj.clone(),
            abbreviations: socrbase.clone(),
        },
        _ => anyhow::bail!("Either --feed-dir or both --addrobj and --socrbase are required"),
    };
    info!("Address objects: {}", feed.address_objects.display());
    info!("Abbreviations: {}", feed.abbreviations.display());

    let source_date = match args.source_date.clone().or_else(|| feed.source_date()) {
        Some(date) => date,
        None => {
            warn!("No source date given or found in file names, forcing a rebuild");
            chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()
        }
    };

    let store = Arc::new(store::open(&config).context("Failed to open record store")?);

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} rows ({per_sec}) {msg}")
            .context("Invalid progress template")?,
    );
    progress.enable_steady_tick(Duration::from_millis(200));

    let outcome = {
        let store = store.clone();
        let build = config.build.clone();
        let force = args.force;
        let source_date = source_date.clone();
        tokio::task::spawn_blocking(move || {
            refresh(&*store, &build, &feed, &source_date, force, progress)
        })
        .await
        .context("Build task panicked")?
        .context("Build failed")?
    };

    match outcome {
        Refresh::UpToDate(current) => {
            info!(
                "Version {} ({}) is current, use --force to rebuild",
                current.version, current.source_date
            );
        }
        Refresh::Published {
            version,
            superseded,
            ..
        } => {
            info!(
                "Version {} ({}) is now current",
                version.version, version.source_date
            );
            if let Some(old) = superseded {
                let grace = config.build.grace_period();
                info!("Retiring version {} in {:?}", old, grace);
                tokio::time::sleep(grace).await;

                let store = store.clone();
                tokio::task::spawn_blocking(move || VersionManager::new(&*store).retire(old))
                    .await
                    .context("Retire task panicked")?
                    .with_context(|| format!("Failed to retire version {}", old))?;
            }
        }
    }

    info!("Ingest complete");
    Ok(())
}
