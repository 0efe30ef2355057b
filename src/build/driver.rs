//! One refresh cycle against a store: freshness check, locked build, publish.

use indicatif::ProgressBar;
use tracing::{error, info};

use super::pipeline::{BuildPipeline, BuildReport};
use crate::config::BuildConfig;
use crate::error::Result;
use crate::feed::FeedFiles;
use crate::models::{DatasetVersion, VersionNumber};
use crate::store::RecordStore;
use crate::version::VersionManager;

#[derive(Debug)]
pub enum Refresh {
    /// The published version was already built from this upstream date
    UpToDate(DatasetVersion),
    Published {
        version: DatasetVersion,
        report: BuildReport,
        /// Version readers used before the cutover; retire it after the grace period
        superseded: Option<VersionNumber>,
    },
}

/// Build and publish a new version from `feed` unless the store already serves `source_date`.
///
/// A failed build is aborted, so its tables and lock never outlive this call.
pub fn refresh<S: RecordStore + ?Sized>(
    store: &S,
    config: &BuildConfig,
    feed: &FeedFiles,
    source_date: &str,
    force: bool,
    progress: ProgressBar,
) -> Result<Refresh> {
    let versions = VersionManager::new(store);
    if !force && versions.is_latest(source_date)? {
        if let Some(current) = versions.current()? {
            info!(
                "Version {} already built from {}, nothing to do",
                current.version, source_date
            );
            return Ok(Refresh::UpToDate(current));
        }
    }

    let pipeline = BuildPipeline::new(config.clone())?.with_progress(progress);
    let superseded = versions.current()?.map(|v| v.version);
    let handle = versions.start_build(versions.next_version()?, source_date)?;

    let dataset = versions.dataset(&handle);
    let report = match pipeline.run(&dataset, feed) {
        Ok(report) => report,
        Err(e) => {
            error!("Build of version {} failed: {}", handle.version(), e);
            if let Err(abort_err) = versions.abort(handle) {
                error!("Failed to clean up aborted build: {}", abort_err);
            }
            return Err(e);
        }
    };

    let version = versions.publish(handle)?;
    Ok(Refresh::Published {
        version,
        report,
        superseded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::SledStore;
    use std::fs;
    use tempfile::TempDir;

    const ADDRESS_OBJECTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<AddressObjects>
  <Object AOGUID="r1" FORMALNAME="Татарстан" SHORTNAME="Респ" AOLEVEL="1" REGIONCODE="16" POSTALCODE="420000" LIVESTATUS="1" ACTSTATUS="1"/>
</AddressObjects>"#;

    const ABBREVIATIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<AddressObjectTypes>
  <AddressObjectType LEVEL="1" SCNAME="Респ" SOCRNAME="Республика" KOD_T_ST="106"/>
</AddressObjectTypes>"#;

    fn feed(dir: &TempDir, objects: &str) -> FeedFiles {
        fs::write(dir.path().join("AS_ADDROBJ_20240101_x.XML"), objects).unwrap();
        fs::write(dir.path().join("AS_SOCRBASE_20240101_x.XML"), ABBREVIATIONS).unwrap();
        FeedFiles::discover(dir.path()).unwrap()
    }

    #[test]
    fn test_same_source_date_is_skipped() {
        let dir = TempDir::new().unwrap();
        let files = feed(&dir, ADDRESS_OBJECTS);
        let store = SledStore::temporary().unwrap();
        let config = BuildConfig::default();

        let first = refresh(&store, &config, &files, "20240101", false, ProgressBar::hidden()).unwrap();
        assert!(matches!(first, Refresh::Published { superseded: None, .. }));

        let second = refresh(&store, &config, &files, "20240101", false, ProgressBar::hidden()).unwrap();
        assert!(matches!(second, Refresh::UpToDate(ref v) if v.version == 1));

        let forced = refresh(&store, &config, &files, "20240101", true, ProgressBar::hidden()).unwrap();
        match forced {
            Refresh::Published { version, superseded, .. } => {
                assert_eq!(version.version, 2);
                assert_eq!(superseded, Some(1));
            }
            other => panic!("expected a new version, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_build_keeps_current_version() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::temporary().unwrap();
        let config = BuildConfig::default();

        let good = feed(&dir, ADDRESS_OBJECTS);
        refresh(&store, &config, &good, "20240101", false, ProgressBar::hidden()).unwrap();

        let broken = feed(&dir, "<AddressObjects><Object AOGUID=\"x\" AOLEVEL=\"nope\" LIVESTATUS=\"1\" ACTSTATUS=\"1\"/></AddressObjects>");
        let err = refresh(&store, &config, &broken, "20240201", false, ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, Error::FeedFormat { .. }));

        let versions = VersionManager::new(&store);
        assert_eq!(versions.current().unwrap().unwrap().version, 1);
        // the aborted build released its lock
        let retry = versions.start_build(2, "20240201").unwrap();
        versions.abort(retry).unwrap();
    }
}
