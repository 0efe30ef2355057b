//! Background rebuilds from a watched feed directory.
//!
//! The server holds the only handle on the record store, so new versions are
//! built in-process while lookups keep reading the current one.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::{error, info, warn};

use addressok::build::{refresh, Refresh};
use addressok::config::Config;
use addressok::feed::FeedFiles;
use addressok::version::VersionManager;

use crate::Store;

/// Check `dir` every `query.refresh_secs` and publish a new version when its date stamp changes
pub async fn run(store: Arc<Store>, config: Config, dir: PathBuf) {
    let mut interval = tokio::time::interval(config.query.refresh_interval());
    info!(
        "Watching {} for new feed documents every {:?}",
        dir.display(),
        config.query.refresh_interval()
    );

    loop {
        interval.tick().await;

        let feed = match FeedFiles::discover(&dir) {
            Ok(feed) => feed,
            Err(e) => {
                warn!("Skipping refresh: {}", e);
                continue;
            }
        };
        let Some(source_date) = feed.source_date() else {
            warn!(
                "Skipping refresh: no date stamp in {}",
                feed.address_objects.display()
            );
            continue;
        };

        let build_store = store.clone();
        let build = config.build.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            refresh(&*build_store, &build, &feed, &source_date, false, ProgressBar::hidden())
        })
        .await;

        let superseded = match outcome {
            Ok(Ok(Refresh::Published {
                version, superseded, ..
            })) => {
                info!(
                    "Now serving version {} ({})",
                    version.version, version.source_date
                );
                superseded
            }
            Ok(Ok(Refresh::UpToDate(_))) => continue,
            Ok(Err(e)) => {
                error!("Background build failed: {}", e);
                continue;
            }
            Err(e) => {
                error!("Background build task failed: {}", e);
                continue;
            }
        };

        if let Some(old) = superseded {
            tokio::time::sleep(config.build.grace_period()).await;
            let retire_store = store.clone();
            match tokio::task::spawn_blocking(move || VersionManager::new(&*retire_store).retire(old))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Failed to retire version {}: {}", old, e),
                Err(e) => error!("Retire task failed: {}", e),
            }
        }
    }
}
